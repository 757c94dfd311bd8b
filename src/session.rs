//! 会话运行器
//!
//! 一个 tokio 任务独占一条流水线：从 mpsc 通道按序接收帧、逐帧处理，
//! 通过 watch 通道发布最新结果与会话汇总。读取方通过 [`MetricsHandle`]
//! 获取完整快照，不会读到更新了一半的结果。
//!
//! 停止只发生在帧与帧之间：收到 shutdown 广播或帧通道关闭。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::WatchStream;

use crate::signals::{
    EngagementResult, LandmarkFrame, Pipeline, PipelineConfig, PipelineError, SessionSummary,
};

/// Final outcome of one monitoring session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub frames_processed: u64,
    pub dropped_frames: u64,
}

/// Cloneable read side of a running session.
#[derive(Clone)]
pub struct MetricsHandle {
    latest_rx: watch::Receiver<EngagementResult>,
    summary_rx: watch::Receiver<SessionSummary>,
    running: Arc<AtomicBool>,
}

impl MetricsHandle {
    pub fn latest(&self) -> EngagementResult {
        self.latest_rx.borrow().clone()
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary_rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 最新结果流；慢速订阅者只会看到最新值，中间结果被合并
    pub fn updates(&self) -> WatchStream<EngagementResult> {
        WatchStream::new(self.latest_rx.clone())
    }
}

pub struct SessionRunner {
    pipeline: Pipeline,
    frames_rx: mpsc::Receiver<LandmarkFrame>,
    shutdown_rx: broadcast::Receiver<()>,
    latest_tx: watch::Sender<EngagementResult>,
    summary_tx: watch::Sender<SessionSummary>,
    results_tx: Option<mpsc::Sender<EngagementResult>>,
    running: Arc<AtomicBool>,
    published_samples: u64,
}

impl SessionRunner {
    pub fn new(
        config: PipelineConfig,
        frames_rx: mpsc::Receiver<LandmarkFrame>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(Self, MetricsHandle), PipelineError> {
        let pipeline = Pipeline::new(config)?;
        let (latest_tx, latest_rx) = watch::channel(pipeline.latest().clone());
        let (summary_tx, summary_rx) = watch::channel(pipeline.accumulator().summary());
        let running = Arc::new(AtomicBool::new(false));

        let handle = MetricsHandle {
            latest_rx,
            summary_rx,
            running: running.clone(),
        };
        let runner = Self {
            pipeline,
            frames_rx,
            shutdown_rx,
            latest_tx,
            summary_tx,
            results_tx: None,
            running,
            published_samples: 0,
        };
        Ok((runner, handle))
    }

    /// 逐帧结果的有序输出；通道满时对帧处理形成背压
    pub fn with_result_sink(mut self, results_tx: mpsc::Sender<EngagementResult>) -> Self {
        self.results_tx = Some(results_tx);
        self
    }

    pub async fn run(mut self) -> Result<SessionReport, PipelineError> {
        self.pipeline.start()?;
        self.running.store(true, Ordering::Release);
        let session_id = self.pipeline.accumulator().session_id();
        tracing::info!(%session_id, "Session started");

        let mut shutdown_open = true;
        loop {
            tokio::select! {
                biased;
                signal = self.shutdown_rx.recv(), if shutdown_open => match signal {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        tracing::info!(%session_id, "Session shutdown requested");
                        break;
                    }
                    // 发送端全部释放：不再可能收到停止信号，继续等待帧
                    Err(broadcast::error::RecvError::Closed) => shutdown_open = false,
                },
                frame = self.frames_rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = self.handle_frame(&frame).await {
                            self.running.store(false, Ordering::Release);
                            return Err(e);
                        }
                    }
                    None => {
                        tracing::info!(%session_id, "Frame source closed");
                        break;
                    }
                },
            }
        }

        self.finish()
    }

    async fn handle_frame(&mut self, frame: &LandmarkFrame) -> Result<(), PipelineError> {
        let result = match self.pipeline.process_frame(frame) {
            Ok(result) => result,
            // 已在流水线内计数并记录日志，会话继续
            Err(e) if e.is_malformed_frame() => return Ok(()),
            Err(e) => return Err(e),
        };

        let sink_closed = match &self.results_tx {
            Some(tx) => tx.send(result.clone()).await.is_err(),
            None => false,
        };
        if sink_closed {
            tracing::warn!("Result sink closed, continuing without per-frame output");
            self.results_tx = None;
        }
        self.latest_tx.send_replace(result);

        let samples = self.pipeline.accumulator().samples();
        if samples != self.published_samples {
            self.published_samples = samples;
            self.summary_tx
                .send_replace(self.pipeline.accumulator().summary());
        }
        Ok(())
    }

    fn finish(mut self) -> Result<SessionReport, PipelineError> {
        self.pipeline.stop()?;
        self.running.store(false, Ordering::Release);

        let summary = self.pipeline.accumulator().summary();
        self.summary_tx.send_replace(summary.clone());

        let report = SessionReport {
            summary,
            frames_processed: self.pipeline.frames_processed(),
            dropped_frames: self.pipeline.dropped_frames(),
        };
        tracing::info!(
            session_id = %report.summary.session_id,
            frames_processed = report.frames_processed,
            dropped_frames = report.dropped_frames,
            avg_engagement = report.summary.avg_engagement,
            avg_confusion = report.summary.avg_confusion,
            "Session finished"
        );
        Ok(report)
    }
}
