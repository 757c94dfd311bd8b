//! EAR / 眨眼 / 睡眠检测模块
//!
//! 眨眼状态机：Open（睁眼）→ Closing（正在闭眼）→ Closed（闭眼）→ Open
//!
//! - EAR 低于阈值时从 Open 进入 Closing；连续闭眼达到 `blink_min_closed_frames`
//!   帧后进入 Closed（默认 1 帧，此时 Closing 在同一帧内完成）
//! - Closed 状态下 EAR 回到阈值以上即回到 Open，并计一次眨眼
//! - 睡眠：EAR 持续低于阈值达到 `sleep_duration_sec` 才置位，
//!   EAR 回升的当帧立即解除（非对称锁存）
//!
//! 眨眼率使用 60 秒时间窗口统计，窗口未满时按实际活跃时长换算。

use crate::signals::config::EarConfig;
use crate::signals::window::TimeWindow;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EyeState {
    Open,
    Closing { closed_frames: u32 },
    Closed,
}

/// EAR 检测结果
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EarResult {
    pub ear_left: f64,
    pub ear_right: f64,
    pub ear_avg: f64,
    pub is_blinking: bool,
    pub is_sleeping: bool,
    /// 会话内累计眨眼次数，单调不减
    pub blink_count: u64,
    pub blinks_per_minute: f64,
    /// EAR 归一化到 [0,1]，1 = 完全睁眼
    pub normalised_ear: f64,
}

impl Default for EarResult {
    fn default() -> Self {
        Self {
            ear_left: 0.0,
            ear_right: 0.0,
            ear_avg: 0.0,
            is_blinking: false,
            is_sleeping: false,
            blink_count: 0,
            blinks_per_minute: 0.0,
            normalised_ear: 1.0,
        }
    }
}

pub struct EarDetector {
    threshold: f64,
    min_closed_frames: u32,
    warmup_ms: f64,
    sleep_duration_ms: f64,
    open_reference: f64,
    state: EyeState,
    blink_count: u64,
    blink_history: TimeWindow<()>,
    /// 第一次得到有效 EAR 的时间戳
    first_seen_ts: Option<f64>,
    /// 本轮连续闭眼开始的时间戳
    below_since_ts: Option<f64>,
    last: EarResult,
}

impl EarDetector {
    pub fn new(config: &EarConfig) -> Self {
        Self {
            threshold: config.ear_threshold,
            min_closed_frames: config.blink_min_closed_frames.max(1),
            warmup_ms: config.blink_rate_warmup_sec * 1000.0,
            sleep_duration_ms: config.sleep_duration_sec * 1000.0,
            open_reference: config.ear_open_reference,
            state: EyeState::Open,
            blink_count: 0,
            blink_history: TimeWindow::from_secs(config.blink_rate_window_sec),
            first_seen_ts: None,
            below_since_ts: None,
            last: EarResult::default(),
        }
    }

    /// 输入左右眼 EAR（无定义时为 None）与时间戳（毫秒）
    ///
    /// 双眼均无定义时返回上一次结果，不推进任何计时器。
    pub fn update(&mut self, left: Option<f64>, right: Option<f64>, timestamp: f64) -> EarResult {
        let ear = match (left, right) {
            (Some(l), Some(r)) => (l + r) / 2.0,
            (Some(e), None) | (None, Some(e)) => e,
            (None, None) => return self.last,
        };
        self.first_seen_ts.get_or_insert(timestamp);

        let closed = ear < self.threshold;
        self.advance_blink_state(closed, timestamp);

        let is_sleeping = if closed {
            let since = *self.below_since_ts.get_or_insert(timestamp);
            timestamp - since >= self.sleep_duration_ms
        } else {
            self.below_since_ts = None;
            false
        };

        self.blink_history.evict(timestamp);

        self.last = EarResult {
            // 单眼无定义时沿用该眼上一次的值，不借用另一只眼
            ear_left: left.unwrap_or(self.last.ear_left),
            ear_right: right.unwrap_or(self.last.ear_right),
            ear_avg: ear,
            is_blinking: self.state != EyeState::Open,
            is_sleeping,
            blink_count: self.blink_count,
            blinks_per_minute: self.calculate_blink_rate(timestamp),
            normalised_ear: (ear / self.open_reference).clamp(0.0, 1.0),
        };
        self.last
    }

    #[cfg(test)]
    pub fn state(&self) -> EyeState {
        self.state
    }

    #[cfg(test)]
    pub fn last(&self) -> EarResult {
        self.last
    }

    pub fn blinks_in_window(&self) -> usize {
        self.blink_history.len()
    }

    fn advance_blink_state(&mut self, closed: bool, timestamp: f64) {
        let current = self.state;
        self.state = match current {
            EyeState::Open if closed => self.closing_or_closed(1),
            EyeState::Open => EyeState::Open,
            EyeState::Closing { closed_frames } if closed => {
                self.closing_or_closed(closed_frames + 1)
            }
            // 闭眼帧数不足，视为噪声
            EyeState::Closing { .. } => EyeState::Open,
            EyeState::Closed if closed => EyeState::Closed,
            EyeState::Closed => {
                self.blink_count += 1;
                self.blink_history.push(timestamp, ());
                EyeState::Open
            }
        };
    }

    fn closing_or_closed(&self, closed_frames: u32) -> EyeState {
        if closed_frames >= self.min_closed_frames {
            EyeState::Closed
        } else {
            EyeState::Closing { closed_frames }
        }
    }

    /// 眨眼率（次/分钟）
    fn calculate_blink_rate(&self, current_ts: f64) -> f64 {
        let Some(first_ts) = self.first_seen_ts else {
            return 0.0;
        };
        let active_ms = current_ts - first_ts;
        if active_ms < self.warmup_ms || active_ms <= 0.0 {
            return 0.0;
        }
        let span_ms = active_ms.min(self.blink_history.duration_ms());
        self.blink_history.len() as f64 * 60_000.0 / span_ms
    }
}
