//! 专注度评分模块
//!
//! 正向信号加权求和，再减去与困惑度成比例的惩罚：
//! - 睁眼程度（归一化 EAR）
//! - 头部稳定度（1 - 归一化方差）
//! - 眼神接触比例
//!
//! 原始分数在 `smoothing_sec` 时间窗口内取均值输出，防止单帧噪声造成跳变。
//! 专注度与困惑度相互独立，两者之和不要求为 100。

use crate::signals::config::EngagementConfig;
use crate::signals::window::TimeWindow;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngagementInputs {
    pub normalised_ear: f64,
    pub head_stability: f64,
    pub contact_ratio: f64,
    /// [0,100]
    pub confusion_score: f64,
}

pub struct EngagementScorer {
    config: EngagementConfig,
    score_history: TimeWindow<f64>,
}

impl EngagementScorer {
    pub fn new(config: &EngagementConfig) -> Self {
        Self {
            config: config.clone(),
            score_history: TimeWindow::from_secs(config.smoothing_sec),
        }
    }

    /// 单帧原始分数 [0,100]
    pub fn raw_score(&self, inputs: &EngagementInputs) -> f64 {
        let w = &self.config.weights;

        let positive = w.eye_openness * inputs.normalised_ear.clamp(0.0, 1.0)
            + w.head_stability * inputs.head_stability.clamp(0.0, 1.0)
            + w.eye_contact * inputs.contact_ratio.clamp(0.0, 1.0);
        let penalty = w.confusion_penalty * (inputs.confusion_score / 100.0).clamp(0.0, 1.0);

        (positive - penalty).clamp(0.0, 1.0) * 100.0
    }

    /// 平滑后的分数 [0,100]
    pub fn compute(&mut self, inputs: &EngagementInputs, timestamp: f64) -> f64 {
        let raw = self.raw_score(inputs);
        self.score_history.push(timestamp, raw);
        self.score_history.mean().unwrap_or(raw).clamp(0.0, 100.0)
    }
}
