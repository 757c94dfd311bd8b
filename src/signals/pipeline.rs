//! 单帧信号提取与评分流水线
//!
//! 流程：
//! 1. 校验帧（时间戳顺序、点数、坐标、面部框），无效帧整帧丢弃
//! 2. 几何映射 → 各检测器更新
//! 3. 困惑度 → 专注度评分
//! 4. 生成不可变的 `EngagementResult`，按采样间隔写入会话累计器
//!
//! 无人脸帧不推进任何检测窗口（冻结而非重置），回显上一帧结果。

use crate::signals::accumulator::SessionAccumulator;
use crate::signals::config::PipelineConfig;
use crate::signals::confusion::{ConfusionInputs, ConfusionScorer};
use crate::signals::ear::EarDetector;
use crate::signals::engagement::{EngagementInputs, EngagementScorer};
use crate::signals::error::{MalformedFrameError, PipelineError};
use crate::signals::gaze::{nose_deviation, GazeDetector};
use crate::signals::geometry::FaceGeometry;
use crate::signals::gesture::{GestureDetector, MicroMovementTracker};
use crate::signals::head_pose::{tilt_angle_deg, HeadPoseDetector};
use crate::signals::types::{EngagementLevel, EngagementResult, LandmarkFrame};
use crate::signals::window::TimeWindow;

const FPS_WINDOW_MS: f64 = 1000.0;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Stopped,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// Occupancy of every detector window, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSizes {
    pub blinks: usize,
    pub head_angles: usize,
    pub gaze_contacts: usize,
    pub nose_positions: usize,
    pub nod_reversals: usize,
    pub shake_reversals: usize,
    pub frame_times: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,

    ear: EarDetector,
    head_pose: HeadPoseDetector,
    gaze: GazeDetector,
    gesture: GestureDetector,
    micro_movement: MicroMovementTracker,
    confusion: ConfusionScorer,
    engagement: EngagementScorer,

    frame_times: TimeWindow<()>,
    last_timestamp: Option<f64>,
    latest: EngagementResult,
    accumulator: SessionAccumulator,

    frames_processed: u64,
    dropped_frames: u64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        warn_on_weight_sums(&config);

        Ok(Self {
            ear: EarDetector::new(&config.ear),
            head_pose: HeadPoseDetector::new(&config.head_pose),
            gaze: GazeDetector::new(&config.gaze),
            gesture: GestureDetector::new(&config.gesture),
            micro_movement: MicroMovementTracker::new(&config.gesture, &config.head_pose),
            confusion: ConfusionScorer::new(&config.confusion),
            engagement: EngagementScorer::new(&config.engagement),
            frame_times: TimeWindow::new(FPS_WINDOW_MS),
            last_timestamp: None,
            latest: EngagementResult::default(),
            accumulator: SessionAccumulator::new(config.log_interval_sec),
            frames_processed: 0,
            dropped_frames: 0,
            state: PipelineState::Idle,
            config,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.state != PipelineState::Idle {
            return Err(self.invalid_state("start"));
        }
        self.state = PipelineState::Running;
        tracing::info!(
            session_id = %self.accumulator.session_id(),
            landmark_count = self.config.landmark_count,
            "Pipeline started"
        );
        Ok(())
    }

    /// Idle 或 Running 均可停止；Stopped 为终态
    pub fn stop(&mut self) -> Result<(), PipelineError> {
        if self.state == PipelineState::Stopped {
            return Err(self.invalid_state("stop"));
        }
        self.state = PipelineState::Stopped;
        tracing::info!(
            session_id = %self.accumulator.session_id(),
            frames_processed = self.frames_processed,
            dropped_frames = self.dropped_frames,
            "Pipeline stopped"
        );
        Ok(())
    }

    pub fn process_frame(&mut self, frame: &LandmarkFrame) -> Result<EngagementResult, PipelineError> {
        if self.state != PipelineState::Running {
            return Err(self.invalid_state("process_frame"));
        }
        let start = std::time::Instant::now();
        let ts = frame.timestamp_ms;

        if let Err(source) = self.check_timestamp(ts) {
            return Err(self.drop_frame(frame, source));
        }

        let result = if frame.face_detected {
            let signals = match FaceGeometry::from_frame(frame, self.config.landmark_count)
                .and_then(|geometry| FrameSignals::derive(&geometry))
            {
                Ok(signals) => signals,
                Err(source) => return Err(self.drop_frame(frame, source)),
            };
            let fps = self.register_frame(ts);
            self.analyse(frame.frame_number, ts, fps, &signals)
        } else {
            let fps = self.register_frame(ts);
            self.latest.echo_without_face(frame.frame_number, ts, fps)
        };

        if self.accumulator.observe(&result) {
            tracing::debug!(
                frame_number = result.frame_number,
                engagement = result.engagement_score,
                confusion = result.confusion_score,
                level = result.engagement_level.as_str(),
                "Session sample recorded"
            );
        }
        if result.is_sleeping && !self.latest.is_sleeping {
            tracing::info!(frame_number = result.frame_number, "Sleep detected");
        }

        self.latest = result.clone();
        self.frames_processed += 1;

        tracing::trace!(
            frame_number = frame.frame_number,
            latency_us = start.elapsed().as_micros() as u64,
            "Frame processed"
        );
        Ok(result)
    }

    pub fn latest(&self) -> &EngagementResult {
        &self.latest
    }

    pub fn accumulator(&self) -> &SessionAccumulator {
        &self.accumulator
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    pub fn window_sizes(&self) -> WindowSizes {
        WindowSizes {
            blinks: self.ear.blinks_in_window(),
            head_angles: self.head_pose.window_len(),
            gaze_contacts: self.gaze.window_len(),
            nose_positions: self.micro_movement.window_len(),
            nod_reversals: self.gesture.nod_reversals(),
            shake_reversals: self.gesture.shake_reversals(),
            frame_times: self.frame_times.len(),
        }
    }

    fn analyse(
        &mut self,
        frame_number: u64,
        ts: f64,
        fps: f64,
        signals: &FrameSignals,
    ) -> EngagementResult {
        let ear = self.ear.update(signals.ear_left, signals.ear_right, ts);
        let head = self.head_pose.update(signals.tilt_angle_deg, ts);
        let gaze = self.gaze.update(signals.nose_deviation, ts);

        let nose = signals.nose;
        let gesture = self.gesture.update(nose, ts);
        let micro_movement = self.micro_movement.update(nose, ts);

        let confusion_score = self.confusion.compute(&ConfusionInputs {
            blinks_per_minute: ear.blinks_per_minute,
            head_angle_variance: head.angle_variance,
            gaze_loss: gaze.gaze_loss(),
            micro_movement,
        });
        let engagement_score = self.engagement.compute(
            &EngagementInputs {
                normalised_ear: ear.normalised_ear,
                head_stability: head.stability(),
                contact_ratio: gaze.contact_ratio,
                confusion_score,
            },
            ts,
        );

        EngagementResult {
            frame_number,
            timestamp_ms: ts,
            face_detected: true,
            fps,
            ear_left: ear.ear_left,
            ear_right: ear.ear_right,
            ear_avg: ear.ear_avg,
            is_blinking: ear.is_blinking,
            is_sleeping: ear.is_sleeping,
            blink_count: ear.blink_count,
            blinks_per_minute: ear.blinks_per_minute,
            tilt_angle_deg: head.tilt_angle_deg,
            is_tilted: head.is_tilted,
            angle_variance: head.angle_variance,
            eye_contact: gaze.eye_contact,
            gaze_deviation: gaze.deviation,
            contact_ratio: gaze.contact_ratio,
            head_nod: gesture.head_nod,
            head_shake: gesture.head_shake,
            micro_movement,
            confusion_score,
            engagement_score,
            engagement_level: EngagementLevel::from_score(engagement_score),
        }
    }

    fn check_timestamp(&self, ts: f64) -> Result<(), MalformedFrameError> {
        if !ts.is_finite() {
            return Err(MalformedFrameError::NonFiniteTimestamp { got_ms: ts });
        }
        match self.last_timestamp {
            Some(last) if ts < last => Err(MalformedFrameError::OutOfOrder {
                last_ms: last,
                got_ms: ts,
            }),
            _ => Ok(()),
        }
    }

    /// 帧已通过校验：推进时间基准，返回最近一秒的帧数
    fn register_frame(&mut self, ts: f64) -> f64 {
        self.last_timestamp = Some(ts);
        self.frame_times.push(ts, ());
        let cutoff = ts - FPS_WINDOW_MS;
        self.frame_times.timestamps().filter(|t| *t > cutoff).count() as f64
    }

    fn drop_frame(&mut self, frame: &LandmarkFrame, source: MalformedFrameError) -> PipelineError {
        self.dropped_frames += 1;
        tracing::warn!(
            frame_number = frame.frame_number,
            dropped_frames = self.dropped_frames,
            error = %source,
            "Dropping malformed frame"
        );
        PipelineError::MalformedFrame {
            frame_number: frame.frame_number,
            source,
        }
    }

    fn invalid_state(&self, operation: &'static str) -> PipelineError {
        PipelineError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }
}

/// 单帧几何推导出的原始信号
///
/// 坐标虽有限，但数值极大时距离计算会溢出为 inf/NaN；
/// 任一信号非有限即整帧丢弃，检测器不会看到该帧。
struct FrameSignals {
    ear_left: Option<f64>,
    ear_right: Option<f64>,
    tilt_angle_deg: f64,
    nose_deviation: f64,
    nose: (f64, f64),
}

impl FrameSignals {
    fn derive(geometry: &FaceGeometry) -> Result<Self, MalformedFrameError> {
        let (left_center, right_center) = geometry.eye_line();
        let signals = Self {
            ear_left: geometry.left_eye.aspect_ratio(),
            ear_right: geometry.right_eye.aspect_ratio(),
            tilt_angle_deg: tilt_angle_deg(left_center, right_center),
            nose_deviation: nose_deviation(geometry),
            nose: geometry.nose_position_normalised(),
        };

        let checks = [
            ("ear_left", signals.ear_left.unwrap_or(0.0)),
            ("ear_right", signals.ear_right.unwrap_or(0.0)),
            ("tilt_angle_deg", signals.tilt_angle_deg),
            ("nose_deviation", signals.nose_deviation),
            ("nose_x", signals.nose.0),
            ("nose_y", signals.nose.1),
        ];
        if let Some(&(signal, _)) = checks.iter().find(|(_, v)| !v.is_finite()) {
            return Err(MalformedFrameError::NonFiniteSignal { signal });
        }
        Ok(signals)
    }
}

fn warn_on_weight_sums(config: &PipelineConfig) {
    let confusion_sum = config.confusion.weights.sum();
    if (confusion_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        tracing::warn!(
            sum = confusion_sum,
            "Confusion weights do not sum to 1, scores are clamped"
        );
    }
    let engagement_sum = config.engagement.weights.sum();
    if (engagement_sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        tracing::warn!(
            sum = engagement_sum,
            "Engagement weights do not sum to 1, scores are clamped"
        );
    }
}
