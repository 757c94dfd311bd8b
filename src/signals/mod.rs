//! 视觉信号提取：关键点几何 → 检测器 → 困惑度 / 专注度评分。
//!
//! ## 模块
//! - `geometry`: 关键点索引 → 眼部六点、鼻尖、面部框
//! - `ear`: EAR、眨眼状态机、眨眼率、睡眠
//! - `head_pose`: 眼线倾斜角、倾斜锁存、角度方差
//! - `gaze`: 鼻尖偏移近似的眼神接触
//! - `gesture`: 点头 / 摇头、微动
//! - `confusion` / `engagement`: 综合评分
//! - `pipeline`: 单帧编排，外部唯一入口
//!
//! 检测器仅在 crate 内可见。

pub mod accumulator;
pub mod config;
pub(crate) mod confusion;
pub(crate) mod ear;
pub(crate) mod engagement;
pub mod error;
pub(crate) mod gaze;
pub mod geometry;
pub(crate) mod gesture;
pub(crate) mod head_pose;
pub mod pipeline;
pub mod types;
pub mod window;

pub use accumulator::{SessionAccumulator, SessionSummary};
pub use config::PipelineConfig;
pub use error::{ConfigurationError, MalformedFrameError, PipelineError};
pub use pipeline::{Pipeline, PipelineState, WindowSizes};
pub use types::{EngagementLevel, EngagementResult, LandmarkFrame, Point};
