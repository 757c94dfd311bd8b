//! 头部手势检测（点头 / 摇头）
//!
//! 分别跟踪鼻尖归一化位置的垂直轴（点头）与水平轴（摇头），统计运动方向的
//! 反转次数：
//! - 首次运动：相对起始锚点的位移达到 `deadzone` 才确定方向
//! - 确定方向后锚点跟随该方向上的峰值移动
//! - 从峰值反向回撤达到 `2 * deadzone`（峰峰值）才算一次反转，
//!   即振幅低于死区的摆动无论从哪个相位开始都不会登记反转
//! - 时间窗口内反转次数达到 `cycle_threshold * 2` 时手势仅在当帧置位，
//!   随后清零反转计数并进入冷却期，冷却期内不登记反转
//!
//! 冷却避免一次持续的摆动被重复报告为多次手势。
//!
//! 同一模块内还维护微动（鼻尖位置方差）信号，供困惑度评分使用。

use crate::signals::config::{GestureConfig, HeadPoseConfig};
use crate::signals::window::TimeWindow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Negative,
    Positive,
}

impl Direction {
    fn of(delta: f64) -> Self {
        if delta < 0.0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }
}

/// 单轴往复计数器
#[derive(Debug, Clone)]
pub struct OscillationTracker {
    deadzone: f64,
    required_reversals: usize,
    cooldown_ms: f64,
    anchor: Option<f64>,
    direction: Option<Direction>,
    reversals: TimeWindow<()>,
    cooldown_until: Option<f64>,
}

impl OscillationTracker {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            deadzone: config.deadzone,
            required_reversals: config.cycle_threshold as usize * 2,
            cooldown_ms: config.cooldown_sec * 1000.0,
            anchor: None,
            direction: None,
            reversals: TimeWindow::from_secs(config.window_sec),
            cooldown_until: None,
        }
    }

    /// 返回本帧是否触发手势
    pub fn update(&mut self, position: f64, timestamp: f64) -> bool {
        self.reversals.evict(timestamp);

        let Some(anchor) = self.anchor else {
            self.anchor = Some(position);
            return false;
        };
        let delta = position - anchor;

        let Some(direction) = self.direction else {
            if delta.abs() >= self.deadzone {
                self.direction = Some(Direction::of(delta));
                self.anchor = Some(position);
            }
            return false;
        };

        if Direction::of(delta) == direction {
            // 同向运动：锚点跟随峰值
            self.anchor = Some(position);
            return false;
        }
        if delta.abs() < 2.0 * self.deadzone {
            return false;
        }

        self.direction = Some(Direction::of(delta));
        self.anchor = Some(position);
        if !self.in_cooldown(timestamp) {
            self.reversals.push(timestamp, ());
        }

        if self.reversals.len() >= self.required_reversals {
            self.reversals.clear();
            self.cooldown_until = Some(timestamp + self.cooldown_ms);
            return true;
        }
        false
    }

    pub fn reversal_count(&self) -> usize {
        self.reversals.len()
    }

    pub fn in_cooldown(&self, timestamp: f64) -> bool {
        self.cooldown_until.is_some_and(|until| timestamp < until)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GestureResult {
    pub head_nod: bool,
    pub head_shake: bool,
}

pub struct GestureDetector {
    nod: OscillationTracker,
    shake: OscillationTracker,
}

impl GestureDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            nod: OscillationTracker::new(config),
            shake: OscillationTracker::new(config),
        }
    }

    /// `nose` 为面部框内归一化的鼻尖位置 (nx, ny)
    pub fn update(&mut self, nose: (f64, f64), timestamp: f64) -> GestureResult {
        let (nx, ny) = nose;
        GestureResult {
            head_nod: self.nod.update(ny, timestamp),
            head_shake: self.shake.update(nx, timestamp),
        }
    }

    pub fn nod_reversals(&self) -> usize {
        self.nod.reversal_count()
    }

    pub fn shake_reversals(&self) -> usize {
        self.shake.reversal_count()
    }
}

/// 鼻尖位置方差（微动）跟踪
pub struct MicroMovementTracker {
    xs: TimeWindow<f64>,
    ys: TimeWindow<f64>,
    high: f64,
    last: f64,
}

impl MicroMovementTracker {
    pub fn new(gesture: &GestureConfig, head_pose: &HeadPoseConfig) -> Self {
        Self {
            xs: TimeWindow::from_secs(head_pose.variance_window_sec),
            ys: TimeWindow::from_secs(head_pose.variance_window_sec),
            high: gesture.micro_move_high,
            last: 0.0,
        }
    }

    /// 返回归一化微动 [0,1]
    pub fn update(&mut self, nose: (f64, f64), timestamp: f64) -> f64 {
        self.xs.push(timestamp, nose.0);
        self.ys.push(timestamp, nose.1);
        let vx = self.xs.variance();
        let vy = self.ys.variance();
        self.last = ((vx + vy) / (2.0 * self.high)).min(1.0);
        self.last
    }

    #[cfg(test)]
    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn window_len(&self) -> usize {
        self.xs.len()
    }
}
