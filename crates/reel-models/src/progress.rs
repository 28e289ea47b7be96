//! Progress events reported while a run executes.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    /// Scoring media and choosing windows
    Selecting,
    /// Rendering one batch intermediate
    RenderingBatch,
    /// Final render or concatenation with audio and title
    Assembling,
    Complete,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressPhase::Selecting => "selecting",
            ProgressPhase::RenderingBatch => "rendering_batch",
            ProgressPhase::Assembling => "assembling",
            ProgressPhase::Complete => "complete",
        }
    }
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Overall completion, 0 to 100
    pub percent: u8,
    pub phase: ProgressPhase,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, phase: ProgressPhase, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            phase,
            message: message.into(),
        }
    }
}
