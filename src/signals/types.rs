use serde::{Deserialize, Serialize};

/// 归一化关键点坐标，z 为相对深度（2D 输入时为 0）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// 平面欧氏距离（忽略 z）
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One frame as handed over by the external landmark detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    pub frame_number: u64,
    /// Capture timestamp in milliseconds.
    pub timestamp_ms: f64,
    pub face_detected: bool,
    #[serde(default)]
    pub points: Vec<Point>,
}

impl LandmarkFrame {
    pub fn new(frame_number: u64, timestamp_ms: f64, points: Vec<Point>) -> Self {
        Self {
            frame_number,
            timestamp_ms,
            face_detected: true,
            points,
        }
    }

    pub fn no_face(frame_number: u64, timestamp_ms: f64) -> Self {
        Self {
            frame_number,
            timestamp_ms,
            face_detected: false,
            points: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementLevel {
    High,
    Moderate,
    Low,
}

impl EngagementLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 65.0 => Self::High,
            s if s >= 35.0 => Self::Moderate,
            _ => Self::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Moderate => "moderate",
            Self::Low => "low",
        }
    }
}

/// Immutable per-frame output of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementResult {
    pub frame_number: u64,
    pub timestamp_ms: f64,
    pub face_detected: bool,
    /// 最近 1 秒采集时间内的帧数
    pub fps: f64,

    pub ear_left: f64,
    pub ear_right: f64,
    pub ear_avg: f64,
    pub is_blinking: bool,
    pub is_sleeping: bool,
    pub blink_count: u64,
    pub blinks_per_minute: f64,

    pub tilt_angle_deg: f64,
    pub is_tilted: bool,
    /// 归一化头部角度方差 [0,1]
    pub angle_variance: f64,

    pub eye_contact: bool,
    pub gaze_deviation: f64,
    pub contact_ratio: f64,

    pub head_nod: bool,
    pub head_shake: bool,
    pub micro_movement: f64,

    pub confusion_score: f64,
    pub engagement_score: f64,
    pub engagement_level: EngagementLevel,
}

impl Default for EngagementResult {
    fn default() -> Self {
        Self {
            frame_number: 0,
            timestamp_ms: 0.0,
            face_detected: false,
            fps: 0.0,
            ear_left: 0.0,
            ear_right: 0.0,
            ear_avg: 0.0,
            is_blinking: false,
            is_sleeping: false,
            blink_count: 0,
            blinks_per_minute: 0.0,
            tilt_angle_deg: 0.0,
            is_tilted: false,
            angle_variance: 0.0,
            eye_contact: true,
            gaze_deviation: 0.0,
            contact_ratio: 1.0,
            head_nod: false,
            head_shake: false,
            micro_movement: 0.0,
            confusion_score: 0.0,
            engagement_score: 50.0,
            engagement_level: EngagementLevel::Moderate,
        }
    }
}

impl EngagementResult {
    /// Echo of this result for a frame without a face: discrete states and
    /// scores are held, one-frame gesture events are not repeated.
    pub(crate) fn echo_without_face(&self, frame_number: u64, timestamp_ms: f64, fps: f64) -> Self {
        Self {
            frame_number,
            timestamp_ms,
            face_detected: false,
            fps,
            head_nod: false,
            head_shake: false,
            ..self.clone()
        }
    }
}
