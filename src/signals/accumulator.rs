//! 会话累计器
//!
//! 每隔 `log_interval_sec`（采集时间）记录一次样本，维护运行计数与求和，
//! 用于会话结束时的平均值汇总。会话结束即丢弃。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::signals::types::{EngagementLevel, EngagementResult};

#[derive(Debug, Clone)]
pub struct SessionAccumulator {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    interval_ms: f64,
    last_sample_ts: Option<f64>,
    first_ts: Option<f64>,
    latest_ts: Option<f64>,

    samples: u64,
    face_samples: u64,
    engagement_sum: f64,
    confusion_sum: f64,
    ear_sum: f64,
    blink_rate_sum: f64,
    contact_ratio_sum: f64,
    sleeping_samples: u64,
    tilted_samples: u64,
    eye_contact_samples: u64,

    // 手势是单帧事件，逐帧统计，不受采样间隔影响
    nod_count: u64,
    shake_count: u64,
    total_blinks: u64,
}

/// Averages over the logged samples of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_sec: f64,
    pub samples: u64,
    pub face_samples: u64,
    pub avg_engagement: f64,
    pub avg_confusion: f64,
    pub avg_ear: f64,
    pub avg_blinks_per_minute: f64,
    pub avg_contact_ratio: f64,
    pub sleeping_ratio: f64,
    pub tilted_ratio: f64,
    pub eye_contact_ratio: f64,
    pub total_blinks: u64,
    pub nod_count: u64,
    pub shake_count: u64,
    pub engagement_level: EngagementLevel,
}

impl SessionAccumulator {
    pub fn new(log_interval_sec: f64) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            interval_ms: log_interval_sec * 1000.0,
            last_sample_ts: None,
            first_ts: None,
            latest_ts: None,
            samples: 0,
            face_samples: 0,
            engagement_sum: 0.0,
            confusion_sum: 0.0,
            ear_sum: 0.0,
            blink_rate_sum: 0.0,
            contact_ratio_sum: 0.0,
            sleeping_samples: 0,
            tilted_samples: 0,
            eye_contact_samples: 0,
            nod_count: 0,
            shake_count: 0,
            total_blinks: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// 每帧调用；返回本帧是否被记为一个样本
    pub(crate) fn observe(&mut self, result: &EngagementResult) -> bool {
        let ts = result.timestamp_ms;
        self.first_ts.get_or_insert(ts);
        self.latest_ts = Some(ts);

        if result.head_nod {
            self.nod_count += 1;
        }
        if result.head_shake {
            self.shake_count += 1;
        }
        self.total_blinks = self.total_blinks.max(result.blink_count);

        let due = match self.last_sample_ts {
            None => true,
            Some(last) => ts - last >= self.interval_ms,
        };
        if !due {
            return false;
        }
        self.last_sample_ts = Some(ts);
        self.record(result);
        true
    }

    fn record(&mut self, result: &EngagementResult) {
        self.samples += 1;
        if result.face_detected {
            self.face_samples += 1;
        }
        self.engagement_sum += result.engagement_score;
        self.confusion_sum += result.confusion_score;
        self.ear_sum += result.ear_avg;
        self.blink_rate_sum += result.blinks_per_minute;
        self.contact_ratio_sum += result.contact_ratio;
        if result.is_sleeping {
            self.sleeping_samples += 1;
        }
        if result.is_tilted {
            self.tilted_samples += 1;
        }
        if result.eye_contact {
            self.eye_contact_samples += 1;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let n = self.samples as f64;
        let avg = |sum: f64| if self.samples == 0 { 0.0 } else { sum / n };
        let ratio = |count: u64| if self.samples == 0 { 0.0 } else { count as f64 / n };

        // 无样本时与默认结果一致：专注度 50
        let avg_engagement = if self.samples == 0 {
            EngagementResult::default().engagement_score
        } else {
            self.engagement_sum / n
        };
        let duration_sec = match (self.first_ts, self.latest_ts) {
            (Some(first), Some(latest)) => ((latest - first) / 1000.0).max(0.0),
            _ => 0.0,
        };

        SessionSummary {
            session_id: self.session_id,
            started_at: self.started_at,
            duration_sec,
            samples: self.samples,
            face_samples: self.face_samples,
            avg_engagement,
            avg_confusion: avg(self.confusion_sum),
            avg_ear: avg(self.ear_sum),
            avg_blinks_per_minute: avg(self.blink_rate_sum),
            avg_contact_ratio: if self.samples == 0 {
                1.0
            } else {
                self.contact_ratio_sum / n
            },
            sleeping_ratio: ratio(self.sleeping_samples),
            tilted_ratio: ratio(self.tilted_samples),
            eye_contact_ratio: ratio(self.eye_contact_samples),
            total_blinks: self.total_blinks,
            nod_count: self.nod_count,
            shake_count: self.shake_count,
            engagement_level: EngagementLevel::from_score(avg_engagement),
        }
    }
}
