//! Errors raised by the media collaborators.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, scoring or rendering media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg binary not found on PATH")]
    FfmpegNotFound,

    #[error("ffprobe binary not found on PATH")]
    FfprobeNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Media file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed ffprobe JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Scan failed: {0}")]
    Scan(#[from] walkdir::Error),

    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    #[error("Memory introspection unavailable: {0}")]
    MemoryUnavailable(String),

    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// `stderr` holds the tail of ffmpeg's diagnostic output when captured.
    pub fn ffmpeg_failed(message: impl Into<String>, stderr: Option<String>, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr,
        }
    }

    pub fn scoring_failed(message: impl Into<String>) -> Self {
        Self::ScoringFailed(message.into())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Missing external tooling rather than a bad input.
    pub fn is_missing_tool(&self) -> bool {
        matches!(self, Self::FfmpegNotFound | Self::FfprobeNotFound)
    }
}
