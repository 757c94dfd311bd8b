use thiserror::Error;

/// 单帧输入无效：整帧丢弃，不进入任何检测窗口
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedFrameError {
    #[error("landmark count mismatch: expected={expected}, actual={actual}")]
    WrongCardinality { expected: usize, actual: usize },
    #[error("non-finite coordinate at landmark {index}")]
    NonFiniteCoordinate { index: usize },
    #[error("degenerate face bounds: width={width}, height={height}")]
    DegenerateFace { width: f64, height: f64 },
    #[error("derived {signal} is not finite")]
    NonFiniteSignal { signal: &'static str },
    #[error("non-finite timestamp: {got_ms}")]
    NonFiniteTimestamp { got_ms: f64 },
    #[error("timestamp went backwards: last={last_ms}ms, got={got_ms}ms")]
    OutOfOrder { last_ms: f64, got_ms: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {field} {message}")]
pub struct ConfigurationError {
    pub field: &'static str,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("malformed frame {frame_number}: {source}")]
    MalformedFrame {
        frame_number: u64,
        #[source]
        source: MalformedFrameError,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl PipelineError {
    pub fn is_malformed_frame(&self) -> bool {
        matches!(self, Self::MalformedFrame { .. })
    }
}
