//! 时间窗口缓冲
//!
//! 所有检测器共用的时间有界有序队列。条目按时间戳淘汰而不是按帧数，
//! 因此帧率抖动（15fps / 60fps）不会改变窗口的语义。

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct TimeWindow<T> {
    /// 窗口长度（毫秒）
    duration_ms: f64,
    entries: VecDeque<(f64, T)>,
}

impl<T> TimeWindow<T> {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            entries: VecDeque::new(),
        }
    }

    pub fn from_secs(duration_sec: f64) -> Self {
        Self::new(duration_sec * 1000.0)
    }

    /// 淘汰严格早于 `now_ms - duration_ms` 的条目
    pub fn evict(&mut self, now_ms: f64) {
        let cutoff = now_ms - self.duration_ms;
        while let Some((ts, _)) = self.entries.front() {
            if *ts < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn push(&mut self, timestamp_ms: f64, value: T) {
        self.evict(timestamp_ms);
        self.entries.push_back((timestamp_ms, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.entries.front().map(|(ts, _)| *ts)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|(ts, _)| *ts)
    }
}

impl TimeWindow<f64> {
    pub fn mean(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.values().sum::<f64>() / self.entries.len() as f64)
    }

    /// 总体方差，少于 2 个样本时为 0
    pub fn variance(&self) -> f64 {
        if self.entries.len() < 2 {
            return 0.0;
        }
        let n = self.entries.len() as f64;
        let mean = self.values().sum::<f64>() / n;
        self.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n
    }
}

impl TimeWindow<bool> {
    /// 窗口内为 true 的帧占比；空窗口返回 None
    pub fn true_ratio(&self) -> Option<f64> {
        if self.entries.is_empty() {
            return None;
        }
        let hits = self.values().filter(|v| **v).count();
        Some(hits as f64 / self.entries.len() as f64)
    }
}
