//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Score samples out of order at index {index}: {previous:.3}s followed by {current:.3}s")]
    UnorderedSeries {
        index: usize,
        previous: f64,
        current: f64,
    },

    #[error("Score sample at index {index} has invalid timestamp {timestamp}")]
    NegativeTimestamp { index: usize, timestamp: f64 },

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Unsupported media file: {0}")]
    UnsupportedMedia(String),
}
