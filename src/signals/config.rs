use serde::{Deserialize, Serialize};

use crate::config::env_parse;
use crate::signals::error::ConfigurationError;

/// MediaPipe FaceLandmarker: 468 face mesh points + 10 iris points
pub const DEFAULT_LANDMARK_COUNT: usize = 478;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarConfig {
    /// EAR 低于此值视为闭眼
    pub ear_threshold: f64,
    /// 进入 Closed 状态所需的连续闭眼帧数
    #[serde(default = "default_blink_min_closed_frames")]
    pub blink_min_closed_frames: u32,
    #[serde(default = "default_blink_rate_window_sec")]
    pub blink_rate_window_sec: f64,
    /// 活跃时间不足此值时眨眼率报告为 0；默认 0，即从第一帧起按活跃时间折算
    #[serde(default = "default_blink_rate_warmup_sec")]
    pub blink_rate_warmup_sec: f64,
    pub sleep_duration_sec: f64,
    /// 完全睁眼的参考 EAR，用于归一化
    #[serde(default = "default_ear_open_reference")]
    pub ear_open_reference: f64,
}

fn default_blink_min_closed_frames() -> u32 {
    1
}
fn default_blink_rate_window_sec() -> f64 {
    60.0
}
fn default_blink_rate_warmup_sec() -> f64 {
    0.0
}
fn default_ear_open_reference() -> f64 {
    0.30
}

impl Default for EarConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.21,
            blink_min_closed_frames: 1,
            blink_rate_window_sec: 60.0,
            blink_rate_warmup_sec: 0.0,
            sleep_duration_sec: 5.0,
            ear_open_reference: 0.30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadPoseConfig {
    pub tilt_threshold_deg: f64,
    pub tilt_duration_sec: f64,
    #[serde(default = "default_variance_window_sec")]
    pub variance_window_sec: f64,
    /// 方差归一化基准（deg²），约 50 deg² 视为"很高"
    #[serde(default = "default_variance_scale_deg2")]
    pub variance_scale_deg2: f64,
}

fn default_variance_window_sec() -> f64 {
    2.0
}
fn default_variance_scale_deg2() -> f64 {
    50.0
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            tilt_threshold_deg: 15.0,
            tilt_duration_sec: 3.0,
            variance_window_sec: 2.0,
            variance_scale_deg2: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GazeConfig {
    /// 允许的鼻尖归一化偏移 (0-1)
    pub eye_contact_nose_tolerance: f64,
    #[serde(default = "default_contact_window_sec")]
    pub contact_window_sec: f64,
}

fn default_contact_window_sec() -> f64 {
    1.0
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            eye_contact_nose_tolerance: 0.04,
            contact_window_sec: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GestureConfig {
    pub deadzone: f64,
    /// 触发所需的完整往复次数（每次往复 = 2 次反向）
    pub cycle_threshold: u32,
    #[serde(default = "default_gesture_window_sec")]
    pub window_sec: f64,
    #[serde(default = "default_gesture_cooldown_sec")]
    pub cooldown_sec: f64,
    /// 鼻尖位置方差归一化基准
    #[serde(default = "default_micro_move_high")]
    pub micro_move_high: f64,
}

fn default_gesture_window_sec() -> f64 {
    1.5
}
fn default_gesture_cooldown_sec() -> f64 {
    1.0
}
fn default_micro_move_high() -> f64 {
    0.003
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            deadzone: 0.008,
            cycle_threshold: 2,
            window_sec: 1.5,
            cooldown_sec: 1.0,
            micro_move_high: 0.003,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionWeights {
    pub blink_rate: f64,
    pub head_variance: f64,
    pub gaze_reduction: f64,
    pub micro_movement: f64,
}

impl Default for ConfusionWeights {
    fn default() -> Self {
        Self {
            blink_rate: 0.25,
            head_variance: 0.30,
            gaze_reduction: 0.25,
            micro_movement: 0.20,
        }
    }
}

impl ConfusionWeights {
    pub fn sum(&self) -> f64 {
        self.blink_rate + self.head_variance + self.gaze_reduction + self.micro_movement
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionConfig {
    /// 校准后的基线眨眼率（次/分钟）
    pub blink_rate_baseline: f64,
    pub blink_rate_high: f64,
    #[serde(default)]
    pub weights: ConfusionWeights,
}

impl Default for ConfusionConfig {
    fn default() -> Self {
        Self {
            blink_rate_baseline: 8.0,
            blink_rate_high: 25.0,
            weights: ConfusionWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementWeights {
    pub eye_openness: f64,
    pub head_stability: f64,
    pub eye_contact: f64,
    pub confusion_penalty: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            eye_openness: 0.30,
            head_stability: 0.25,
            eye_contact: 0.30,
            confusion_penalty: 0.15,
        }
    }
}

impl EngagementWeights {
    pub fn sum(&self) -> f64 {
        self.eye_openness + self.head_stability + self.eye_contact + self.confusion_penalty
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementConfig {
    #[serde(default = "default_engagement_smoothing_sec")]
    pub smoothing_sec: f64,
    #[serde(default)]
    pub weights: EngagementWeights,
}

fn default_engagement_smoothing_sec() -> f64 {
    1.0
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            smoothing_sec: 1.0,
            weights: EngagementWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    #[serde(default = "default_landmark_count")]
    pub landmark_count: usize,
    /// 会话累计器的采样间隔（秒，按采集时间）
    #[serde(default = "default_log_interval_sec")]
    pub log_interval_sec: f64,
    #[serde(default)]
    pub ear: EarConfig,
    #[serde(default)]
    pub head_pose: HeadPoseConfig,
    #[serde(default)]
    pub gaze: GazeConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub confusion: ConfusionConfig,
    #[serde(default)]
    pub engagement: EngagementConfig,
}

fn default_landmark_count() -> usize {
    DEFAULT_LANDMARK_COUNT
}
fn default_log_interval_sec() -> f64 {
    1.0
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            landmark_count: DEFAULT_LANDMARK_COUNT,
            log_interval_sec: 1.0,
            ear: EarConfig::default(),
            head_pose: HeadPoseConfig::default(),
            gaze: GazeConfig::default(),
            gesture: GestureConfig::default(),
            confusion: ConfusionConfig::default(),
            engagement: EngagementConfig::default(),
        }
    }
}

fn check_finite(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigurationError::new(field, "must be a finite number"))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigurationError> {
    check_finite(field, value)?;
    if value <= 0.0 {
        return Err(ConfigurationError::new(field, format!("must be > 0, got {value}")));
    }
    Ok(())
}

fn check_range(
    field: &'static str,
    value: f64,
    low: f64,
    high: f64,
) -> Result<(), ConfigurationError> {
    check_finite(field, value)?;
    if !(low..=high).contains(&value) {
        return Err(ConfigurationError::new(
            field,
            format!("must be in [{low},{high}], got {value}"),
        ));
    }
    Ok(())
}

impl PipelineConfig {
    /// Defaults overridden by the recognized environment variables.
    ///
    /// 已识别的变量解析失败时返回错误，而不是静默回退到默认值。
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let d = Self::default();
        Ok(Self {
            landmark_count: env_parse("LANDMARK_COUNT", d.landmark_count)?,
            log_interval_sec: env_parse("LOG_INTERVAL_SEC", d.log_interval_sec)?,
            ear: EarConfig {
                ear_threshold: env_parse("EAR_THRESHOLD", d.ear.ear_threshold)?,
                blink_min_closed_frames: env_parse(
                    "BLINK_MIN_CLOSED_FRAMES",
                    d.ear.blink_min_closed_frames,
                )?,
                blink_rate_window_sec: d.ear.blink_rate_window_sec,
                blink_rate_warmup_sec: env_parse(
                    "BLINK_RATE_WARMUP_SEC",
                    d.ear.blink_rate_warmup_sec,
                )?,
                sleep_duration_sec: env_parse("SLEEP_DURATION_SEC", d.ear.sleep_duration_sec)?,
                ear_open_reference: env_parse("EAR_OPEN_REFERENCE", d.ear.ear_open_reference)?,
            },
            head_pose: HeadPoseConfig {
                tilt_threshold_deg: env_parse(
                    "TILT_THRESHOLD_DEG",
                    d.head_pose.tilt_threshold_deg,
                )?,
                tilt_duration_sec: env_parse("TILT_DURATION_SEC", d.head_pose.tilt_duration_sec)?,
                variance_window_sec: env_parse(
                    "HEAD_VARIANCE_WINDOW_SEC",
                    d.head_pose.variance_window_sec,
                )?,
                variance_scale_deg2: env_parse(
                    "HEAD_VARIANCE_SCALE_DEG2",
                    d.head_pose.variance_scale_deg2,
                )?,
            },
            gaze: GazeConfig {
                eye_contact_nose_tolerance: env_parse(
                    "EYE_CONTACT_NOSE_TOLERANCE",
                    d.gaze.eye_contact_nose_tolerance,
                )?,
                contact_window_sec: env_parse("CONTACT_WINDOW_SEC", d.gaze.contact_window_sec)?,
            },
            gesture: GestureConfig {
                deadzone: env_parse("GESTURE_DEADZONE", d.gesture.deadzone)?,
                cycle_threshold: env_parse("GESTURE_CYCLE_THRESHOLD", d.gesture.cycle_threshold)?,
                window_sec: env_parse("GESTURE_WINDOW_SEC", d.gesture.window_sec)?,
                cooldown_sec: env_parse("GESTURE_COOLDOWN_SEC", d.gesture.cooldown_sec)?,
                micro_move_high: env_parse("MICRO_MOVE_HIGH", d.gesture.micro_move_high)?,
            },
            confusion: ConfusionConfig {
                blink_rate_baseline: env_parse(
                    "BLINK_RATE_BASELINE",
                    d.confusion.blink_rate_baseline,
                )?,
                blink_rate_high: env_parse("BLINK_RATE_HIGH", d.confusion.blink_rate_high)?,
                weights: ConfusionWeights {
                    blink_rate: env_parse(
                        "CONFUSION_WEIGHT_BLINK_RATE",
                        d.confusion.weights.blink_rate,
                    )?,
                    head_variance: env_parse(
                        "CONFUSION_WEIGHT_HEAD_VARIANCE",
                        d.confusion.weights.head_variance,
                    )?,
                    gaze_reduction: env_parse(
                        "CONFUSION_WEIGHT_GAZE_REDUCTION",
                        d.confusion.weights.gaze_reduction,
                    )?,
                    micro_movement: env_parse(
                        "CONFUSION_WEIGHT_MICRO_MOVEMENT",
                        d.confusion.weights.micro_movement,
                    )?,
                },
            },
            engagement: EngagementConfig {
                smoothing_sec: env_parse(
                    "ENGAGEMENT_SMOOTHING_SEC",
                    d.engagement.smoothing_sec,
                )?,
                weights: EngagementWeights {
                    eye_openness: env_parse(
                        "ENGAGEMENT_WEIGHT_EYE_OPENNESS",
                        d.engagement.weights.eye_openness,
                    )?,
                    head_stability: env_parse(
                        "ENGAGEMENT_WEIGHT_HEAD_STABILITY",
                        d.engagement.weights.head_stability,
                    )?,
                    eye_contact: env_parse(
                        "ENGAGEMENT_WEIGHT_EYE_CONTACT",
                        d.engagement.weights.eye_contact,
                    )?,
                    confusion_penalty: env_parse(
                        "ENGAGEMENT_WEIGHT_CONFUSION_PENALTY",
                        d.engagement.weights.confusion_penalty,
                    )?,
                },
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        // Highest index read by the geometry mapper is the right cheek (454).
        if self.landmark_count <= crate::signals::geometry::MAX_REQUIRED_INDEX {
            return Err(ConfigurationError::new(
                "landmark_count",
                format!(
                    "must exceed {}, got {}",
                    crate::signals::geometry::MAX_REQUIRED_INDEX,
                    self.landmark_count
                ),
            ));
        }
        check_positive("log_interval_sec", self.log_interval_sec)?;

        // EarConfig
        check_range("ear_threshold", self.ear.ear_threshold, 0.0, 1.0)?;
        if self.ear.ear_threshold <= 0.0 {
            return Err(ConfigurationError::new("ear_threshold", "must be > 0"));
        }
        if self.ear.blink_min_closed_frames == 0 {
            return Err(ConfigurationError::new("blink_min_closed_frames", "must be >= 1"));
        }
        check_positive("blink_rate_window_sec", self.ear.blink_rate_window_sec)?;
        check_range(
            "blink_rate_warmup_sec",
            self.ear.blink_rate_warmup_sec,
            0.0,
            self.ear.blink_rate_window_sec,
        )?;
        check_positive("sleep_duration_sec", self.ear.sleep_duration_sec)?;
        check_positive("ear_open_reference", self.ear.ear_open_reference)?;

        // HeadPoseConfig
        check_range("tilt_threshold_deg", self.head_pose.tilt_threshold_deg, 0.0, 90.0)?;
        check_positive("tilt_duration_sec", self.head_pose.tilt_duration_sec)?;
        check_positive("head_variance_window_sec", self.head_pose.variance_window_sec)?;
        check_positive("head_variance_scale_deg2", self.head_pose.variance_scale_deg2)?;

        // GazeConfig
        check_range(
            "eye_contact_nose_tolerance",
            self.gaze.eye_contact_nose_tolerance,
            0.0,
            0.5,
        )?;
        check_positive("contact_window_sec", self.gaze.contact_window_sec)?;

        // GestureConfig
        check_range("gesture_deadzone", self.gesture.deadzone, 0.0, 1.0)?;
        if self.gesture.deadzone <= 0.0 {
            return Err(ConfigurationError::new("gesture_deadzone", "must be > 0"));
        }
        if self.gesture.cycle_threshold == 0 {
            return Err(ConfigurationError::new("gesture_cycle_threshold", "must be >= 1"));
        }
        check_positive("gesture_window_sec", self.gesture.window_sec)?;
        check_range("gesture_cooldown_sec", self.gesture.cooldown_sec, 0.0, 60.0)?;
        check_positive("micro_move_high", self.gesture.micro_move_high)?;

        // ConfusionConfig
        check_range("blink_rate_baseline", self.confusion.blink_rate_baseline, 0.0, 120.0)?;
        check_range("blink_rate_high", self.confusion.blink_rate_high, 0.0, 120.0)?;
        if self.confusion.blink_rate_high <= self.confusion.blink_rate_baseline {
            return Err(ConfigurationError::new(
                "blink_rate_high",
                "must be > blink_rate_baseline",
            ));
        }
        let cw = &self.confusion.weights;
        check_range("confusion.weights.blink_rate", cw.blink_rate, 0.0, 1.0)?;
        check_range("confusion.weights.head_variance", cw.head_variance, 0.0, 1.0)?;
        check_range("confusion.weights.gaze_reduction", cw.gaze_reduction, 0.0, 1.0)?;
        check_range("confusion.weights.micro_movement", cw.micro_movement, 0.0, 1.0)?;

        // EngagementConfig
        check_positive("engagement_smoothing_sec", self.engagement.smoothing_sec)?;
        let ew = &self.engagement.weights;
        check_range("engagement.weights.eye_openness", ew.eye_openness, 0.0, 1.0)?;
        check_range("engagement.weights.head_stability", ew.head_stability, 0.0, 1.0)?;
        check_range("engagement.weights.eye_contact", ew.eye_contact, 0.0, 1.0)?;
        check_range(
            "engagement.weights.confusion_penalty",
            ew.confusion_penalty,
            0.0,
            1.0,
        )?;

        Ok(())
    }
}
