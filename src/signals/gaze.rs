//! 视线 / 眼神接触检测
//!
//! 以鼻尖相对面部中心的水平偏移近似偏航角：
//! deviation = (nose_x - face_center_x) / face_width
//!
//! 当前帧 |deviation| 不超过容差即视为眼神接触；接触比例为时间窗口内
//! 接触帧的占比，是连续信号，不做阈值锁存。

use crate::signals::config::GazeConfig;
use crate::signals::geometry::FaceGeometry;
use crate::signals::window::TimeWindow;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GazeResult {
    pub deviation: f64,
    pub eye_contact: bool,
    /// 窗口内接触帧占比 [0,1]
    pub contact_ratio: f64,
}

impl Default for GazeResult {
    fn default() -> Self {
        Self {
            deviation: 0.0,
            eye_contact: true,
            contact_ratio: 1.0,
        }
    }
}

impl GazeResult {
    /// 1 = 完全离屏，0 = 始终注视屏幕
    pub fn gaze_loss(&self) -> f64 {
        1.0 - self.contact_ratio
    }
}

pub fn nose_deviation(geometry: &FaceGeometry) -> f64 {
    (geometry.nose_tip.x - geometry.face_center_x()) / geometry.bounds.width()
}

pub struct GazeDetector {
    tolerance: f64,
    contact_history: TimeWindow<bool>,
    last: GazeResult,
}

impl GazeDetector {
    pub fn new(config: &GazeConfig) -> Self {
        Self {
            tolerance: config.eye_contact_nose_tolerance,
            contact_history: TimeWindow::from_secs(config.contact_window_sec),
            last: GazeResult::default(),
        }
    }

    pub fn update(&mut self, deviation: f64, timestamp: f64) -> GazeResult {
        let eye_contact = deviation.abs() <= self.tolerance;
        self.contact_history.push(timestamp, eye_contact);

        self.last = GazeResult {
            deviation,
            eye_contact,
            contact_ratio: self.contact_history.true_ratio().unwrap_or(1.0),
        };
        self.last
    }

    #[cfg(test)]
    pub fn last(&self) -> GazeResult {
        self.last
    }

    pub fn window_len(&self) -> usize {
        self.contact_history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_is_per_frame_ratio_is_windowed() {
        let mut det = GazeDetector::new(&GazeConfig::default());
        assert_eq!(det.last().contact_ratio, 1.0);

        let r = det.update(0.01, 0.0);
        assert!(r.eye_contact);
        let r = det.update(-0.2, 100.0);
        assert!(!r.eye_contact);
        assert!((r.contact_ratio - 0.5).abs() < 1e-12);
        assert!((r.gaze_loss() - 0.5).abs() < 1e-12);

        // both samples fall out of the 1 s window
        let r = det.update(0.0, 1200.0);
        assert_eq!(r.contact_ratio, 1.0);
    }

    #[test]
    fn tolerance_boundary_counts_as_contact() {
        let mut det = GazeDetector::new(&GazeConfig::default());
        assert!(det.update(0.04, 0.0).eye_contact);
        assert!(det.update(-0.04, 10.0).eye_contact);
        assert!(!det.update(0.0401, 20.0).eye_contact);
    }
}
