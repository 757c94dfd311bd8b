//! 困惑度评分模块
//!
//! 四个子信号分别归一化到 [0,1] 后按配置权重加权，结果映射到 [0,100]：
//! - 眨眼率：相对校准基线的升高（认知负荷）
//! - 头部角度方差：不稳定的头部 = 搜索 / 困惑
//! - 视线不稳定：1 - 接触比例
//! - 微动：鼻尖位置抖动
//!
//! 权重不要求和为 1，最终结果统一裁剪到 [0,100]。

use crate::signals::config::ConfusionConfig;

/// 评分器输入，各字段来自对应检测器的当前窗口
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfusionInputs {
    pub blinks_per_minute: f64,
    /// 归一化头部角度方差 [0,1]
    pub head_angle_variance: f64,
    /// 1 - 接触比例 [0,1]
    pub gaze_loss: f64,
    /// 归一化微动 [0,1]
    pub micro_movement: f64,
}

pub struct ConfusionScorer {
    config: ConfusionConfig,
}

impl ConfusionScorer {
    pub fn new(config: &ConfusionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// 眨眼率 → [0,1]：基线及以下为 0，达到 high 为 1
    pub fn blink_rate_signal(&self, blinks_per_minute: f64) -> f64 {
        map_unit(
            blinks_per_minute,
            self.config.blink_rate_baseline,
            self.config.blink_rate_high,
        )
    }

    pub fn compute(&self, inputs: &ConfusionInputs) -> f64 {
        let w = &self.config.weights;

        let raw = w.blink_rate * self.blink_rate_signal(inputs.blinks_per_minute)
            + w.head_variance * inputs.head_angle_variance.clamp(0.0, 1.0)
            + w.gaze_reduction * inputs.gaze_loss.clamp(0.0, 1.0)
            + w.micro_movement * inputs.micro_movement.clamp(0.0, 1.0);

        (raw * 100.0).clamp(0.0, 100.0)
    }
}

/// 线性映射：将值从 [low, high] 映射到 [0, 1]
pub(crate) fn map_unit(value: f64, low: f64, high: f64) -> f64 {
    if high <= low {
        return 0.0;
    }
    ((value - low) / (high - low)).clamp(0.0, 1.0)
}
