//! Planner error types.

use thiserror::Error;

use crate::memory::format_memory_size;

pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("No media to plan")]
    NoMedia,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "Estimated peak memory {} exceeds available {}; set a batch size (recommended: {recommended_batch_size})",
        human(.peak),
        human(.available)
    )]
    InsufficientMemory {
        peak: u64,
        available: u64,
        recommended_batch_size: usize,
    },

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Model error: {0}")]
    Model(#[from] reel_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn human(bytes: &u64) -> String {
    format_memory_size(*bytes)
}

impl PlannerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn render_failed(msg: impl Into<String>) -> Self {
        Self::RenderFailed(msg.into())
    }

    /// Check if the user can fix this by changing inputs or settings.
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            PlannerError::NoMedia
                | PlannerError::InvalidInput(_)
                | PlannerError::InsufficientMemory { .. }
                | PlannerError::Model(_)
        )
    }

    /// Check if this is the memory refusal.
    pub fn is_insufficient_memory(&self) -> bool {
        matches!(self, PlannerError::InsufficientMemory { .. })
    }
}
