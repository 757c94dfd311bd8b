//! 头部倾斜检测模块
//!
//! 基于两眼中心连线的斜率计算滚转角（roll），不做完整的 3D 姿态求解。
//! 倾斜状态机：Level → Tilted
//! - |angle| 超过阈值并持续 `tilt_duration_sec` 才进入 Tilted
//! - 回到阈值以内的当帧立即回到 Level（与睡眠检测一致的非对称锁存）
//!
//! 时间窗口内的角度方差作为连续信号提供给困惑度评分。

use crate::signals::config::HeadPoseConfig;
use crate::signals::types::Point;
use crate::signals::window::TimeWindow;

/// 眼线与水平方向的夹角（度），归一化到 [-90, 90]
pub fn tilt_angle_deg(left_eye: Point, right_eye: Point) -> f64 {
    let dx = right_eye.x - left_eye.x;
    let dy = right_eye.y - left_eye.y;
    let angle = dy.atan2(dx).to_degrees();
    if angle > 90.0 {
        angle - 180.0
    } else if angle < -90.0 {
        angle + 180.0
    } else {
        angle
    }
}

/// 头部姿态分析结果
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct HeadPoseResult {
    pub tilt_angle_deg: f64,
    pub is_tilted: bool,
    /// 窗口内角度方差（deg²）
    pub variance_deg2: f64,
    /// 归一化方差 [0,1]
    pub angle_variance: f64,
}

impl HeadPoseResult {
    /// 头部稳定度 = 1 - 归一化方差
    pub fn stability(&self) -> f64 {
        1.0 - self.angle_variance
    }
}

pub struct HeadPoseDetector {
    threshold_deg: f64,
    tilt_duration_ms: f64,
    variance_scale: f64,
    /// 本轮持续超阈值开始的时间戳
    over_since_ts: Option<f64>,
    angles: TimeWindow<f64>,
    last: HeadPoseResult,
}

impl HeadPoseDetector {
    pub fn new(config: &HeadPoseConfig) -> Self {
        Self {
            threshold_deg: config.tilt_threshold_deg,
            tilt_duration_ms: config.tilt_duration_sec * 1000.0,
            variance_scale: config.variance_scale_deg2,
            over_since_ts: None,
            angles: TimeWindow::from_secs(config.variance_window_sec),
            last: HeadPoseResult::default(),
        }
    }

    pub fn update(&mut self, angle_deg: f64, timestamp: f64) -> HeadPoseResult {
        let is_tilted = if angle_deg.abs() > self.threshold_deg {
            let since = *self.over_since_ts.get_or_insert(timestamp);
            timestamp - since >= self.tilt_duration_ms
        } else {
            self.over_since_ts = None;
            false
        };

        self.angles.push(timestamp, angle_deg);
        let variance_deg2 = self.angles.variance();

        self.last = HeadPoseResult {
            tilt_angle_deg: angle_deg,
            is_tilted,
            variance_deg2,
            angle_variance: (variance_deg2 / self.variance_scale).min(1.0),
        };
        self.last
    }

    #[cfg(test)]
    pub fn last(&self) -> HeadPoseResult {
        self.last
    }

    pub fn window_len(&self) -> usize {
        self.angles.len()
    }
}
