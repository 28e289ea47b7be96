//! Highlight reel planning.
//!
//! This crate provides:
//! - Sliding-window search over score series
//! - Uniform and beat-synchronized pacing
//! - Per-item clip selection with graceful fallbacks
//! - Memory estimation and the single-pass/batched decision
//! - Sequential batch execution with monotonic progress

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod metrics;
pub mod pacing;
pub mod progress;
pub mod scheduler;
pub mod score_series;
pub mod selector;

pub use batch::{optimal_batch_size, PlanRequest, Planner, DEFAULT_MAX_BATCH_SIZE};
pub use config::PlannerConfig;
pub use error::{PlannerError, PlannerResult};
pub use logging::RunLogger;
pub use memory::{check_memory_safety, estimate_clip_memory, format_memory_size, MemoryEstimator};
pub use pacing::{uniform_target_duration, BeatCursor, BeatGrid, PacingPlan};
pub use reel_models::PacingStrategy;
pub use progress::{noop_progress, ProgressCallback, ProgressTracker};
pub use scheduler::{BatchScheduler, ClipScope, RenderJob, RenderSummary};
pub use score_series::{best_window, window_average, BestWindow};
pub use selector::{choose_window, ClipSelector, WindowChoice};
