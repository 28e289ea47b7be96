//! Shared data models for the highlight reel planner.
//!
//! This crate provides Serde-serializable types for:
//! - Media items discovered by the scanner
//! - Score series produced by frame scoring
//! - Clip selections handed to the renderer
//! - Pacing strategies, memory estimates, verdicts and execution plans
//! - Progress events and encoding configuration

pub mod encoding;
pub mod error;
pub mod media;
pub mod memory;
pub mod pacing;
pub mod plan;
pub mod progress;
pub mod score;
pub mod selection;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use media::{MediaItem, MediaKind};
pub use memory::{ItemEstimate, MemoryEstimate, MemoryLevel, MemoryVerdict};
pub use pacing::PacingStrategy;
pub use plan::{BatchPlan, ExecutionMode, ExecutionPlan};
pub use progress::{ProgressEvent, ProgressPhase};
pub use score::{ScoreSample, ScoreSeries};
pub use selection::{ClipSelection, SelectionSource};
