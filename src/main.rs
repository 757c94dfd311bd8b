use std::process::ExitCode;

use engagement_monitor::config::Config;
use engagement_monitor::logging::{init_tracing, LogConfig, LoggingError};
use engagement_monitor::session::{SessionReport, SessionRunner};
use engagement_monitor::signals::{
    ConfigurationError, EngagementResult, LandmarkFrame, PipelineError,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    match run().await {
        Ok(report) => {
            tracing::info!(
                frames_processed = report.frames_processed,
                dropped_frames = report.dropped_frames,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "engagement-monitor failed");
            eprintln!("engagement-monitor: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<SessionReport, CliError> {
    let config = Config::from_env()?;
    init_tracing(&LogConfig::from(&config))?;

    let source = std::env::args().nth(1).filter(|p| p != "-");
    tracing::info!(
        source = source.as_deref().unwrap_or("stdin"),
        landmark_count = config.pipeline.landmark_count,
        "Starting engagement-monitor"
    );
    let reader = open_source(source.as_deref()).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let (frames_tx, frames_rx) = mpsc::channel::<LandmarkFrame>(config.frame_channel_capacity);

    let (runner, _metrics) = SessionRunner::new(
        config.pipeline.clone(),
        frames_rx,
        shutdown_tx.subscribe(),
    )?;

    let (session, writer) = if config.summary_only {
        (tokio::spawn(runner.run()), None)
    } else {
        let (results_tx, results_rx) =
            mpsc::channel::<EngagementResult>(config.frame_channel_capacity);
        let session = tokio::spawn(runner.with_result_sink(results_tx).run());
        (session, Some(tokio::spawn(write_results(results_rx))))
    };

    tokio::spawn(shutdown_signal(shutdown_tx.clone()));

    let skipped = feed_frames(reader, frames_tx, shutdown_tx.subscribe()).await?;
    if skipped > 0 {
        tracing::warn!(skipped, "Skipped unparseable input lines");
    }

    let report = session.await??;
    if let Some(writer) = writer {
        writer.await??;
    }

    let mut stdout = tokio::io::stdout();
    if config.summary_only {
        let line = serde_json::to_string(&report).map_err(std::io::Error::from)?;
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    tracing::info!(
        session_id = %report.summary.session_id,
        duration_sec = report.summary.duration_sec,
        avg_engagement = report.summary.avg_engagement,
        avg_confusion = report.summary.avg_confusion,
        total_blinks = report.summary.total_blinks,
        level = report.summary.engagement_level.as_str(),
        "Session summary"
    );
    Ok(report)
}

async fn open_source(path: Option<&str>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|source| CliError::Open {
                    path: path.to_string(),
                    source,
                })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

/// 逐行解析 JSON 帧并送入会话；返回跳过的无效行数
async fn feed_frames(
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    frames_tx: mpsc::Sender<LandmarkFrame>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<u64, CliError> {
    let mut lines = reader.lines();
    let mut skipped = 0_u64;
    let mut line_no = 0_u64;

    loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let frame = match serde_json::from_str::<LandmarkFrame>(&line) {
            Ok(frame) => frame,
            Err(e) => {
                skipped += 1;
                tracing::warn!(line = line_no, error = %e, "Invalid frame JSON, skipping");
                continue;
            }
        };
        // 会话已停止
        if frames_tx.send(frame).await.is_err() {
            break;
        }
    }
    Ok(skipped)
}

async fn write_results(mut results_rx: mpsc::Receiver<EngagementResult>) -> Result<(), CliError> {
    let mut stdout = tokio::io::stdout();
    while let Some(result) = results_rx.recv().await {
        let mut line = serde_json::to_vec(&result).map_err(std::io::Error::from)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
