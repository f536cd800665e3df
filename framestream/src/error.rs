//! Error types for the frame streaming engine

use thiserror::Error;

/// Result type alias for the streaming engine
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while fetching, scheduling, or evaluating frames
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("fetch attempt timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("all {attempts} fetch attempts failed: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<StreamError>,
    },

    #[error("fetch cancelled")]
    Cancelled,

    #[error("frame index {index} out of range (sequence has {count} frames)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed point buffer: {len} bytes is not a whole number of x,y,z triples")]
    PointBuffer { len: usize },
}

impl StreamError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn manifest<S: Into<String>>(msg: S) -> Self {
        Self::Manifest(msg.into())
    }

    /// Cancellation is expected, not exceptional; callers use this to keep
    /// it out of miss counting and error reporting.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
