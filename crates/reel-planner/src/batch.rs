//! Execution planning: single pass or bounded batches.

use std::sync::Arc;

use reel_media::{MediaProbe, MemoryProbe};
use reel_models::{
    BatchPlan, ExecutionMode, ExecutionPlan, MediaItem, MemoryEstimate, MemoryLevel, MemoryVerdict, ModelError,
    PacingStrategy,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{PlannerConfig, MAX_MAX_FRAMES, MIN_MAX_FRAMES};
use crate::error::{PlannerError, PlannerResult};
use crate::memory::{check_memory_safety, format_memory_size, unknown_verdict, MemoryEstimator, ASSEMBLY_FACTOR};
use crate::metrics;
use crate::pacing::PacingPlan;

/// Largest batch size ever recommended.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Items per batch that fit the memory budget.
///
/// `max(1, floor(available * safety_factor / (item_bytes * 1.5)))`, capped at
/// `max_batch_size`. With no representative item the answer is 1.
pub fn optimal_batch_size(item_bytes: Option<u64>, available: u64, safety_factor: f64, max_batch_size: usize) -> usize {
    let Some(item_bytes) = item_bytes else {
        return 1;
    };
    let max_batch_size = max_batch_size.max(1);
    let per_item = item_bytes as f64 * ASSEMBLY_FACTOR;
    if per_item <= 0.0 {
        return max_batch_size;
    }
    let budget = available as f64 * safety_factor;
    ((budget / per_item).floor() as usize).clamp(1, max_batch_size)
}

/// Inputs to [`Planner::plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Media in scan order
    pub items: Vec<MediaItem>,
    pub audio_duration: f64,
    /// Crossfade seconds between adjacent clips
    pub transition: f64,
    pub max_frames: usize,
    /// Explicit batch size; skips the memory refusal
    pub batch_size_override: Option<usize>,
    pub skip_memory_check: bool,
    #[serde(default)]
    pub pacing: PacingStrategy,
}

/// Decides how a run will execute.
#[derive(Clone)]
pub struct Planner {
    estimator: MemoryEstimator,
    memory: Arc<dyn MemoryProbe>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(probe: Arc<dyn MediaProbe>, memory: Arc<dyn MemoryProbe>, config: PlannerConfig) -> Self {
        Self {
            estimator: MemoryEstimator::new(probe, config.target_width),
            memory,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn estimator(&self) -> &MemoryEstimator {
        &self.estimator
    }

    /// Build the execution plan for a run.
    ///
    /// Refuses with [`PlannerError::InsufficientMemory`] only when the
    /// estimate exceeds available memory and no batch size was given.
    pub async fn plan(&self, request: PlanRequest) -> PlannerResult<ExecutionPlan> {
        let PlanRequest {
            items,
            audio_duration,
            transition,
            max_frames,
            batch_size_override,
            skip_memory_check,
            pacing,
        } = request;

        if items.is_empty() {
            return Err(PlannerError::NoMedia);
        }
        if !(MIN_MAX_FRAMES..=MAX_MAX_FRAMES).contains(&max_frames) {
            return Err(PlannerError::invalid_input(format!(
                "max frames must be between {MIN_MAX_FRAMES} and {MAX_MAX_FRAMES}, got {max_frames}"
            )));
        }
        if batch_size_override == Some(0) {
            return Err(ModelError::ZeroBatchSize.into());
        }

        let target_duration = PacingPlan::resolve(&pacing, audio_duration, items.len(), transition)?.target_duration();

        let (estimate, memory) = if skip_memory_check {
            info!("Memory check skipped");
            (None, None)
        } else {
            let estimate = self.estimator.estimate(&items, target_duration).await;
            let verdict = self.verdict(&estimate).await;
            metrics::record_memory_verdict(verdict.level);
            info!(
                level = %verdict.level,
                peak = %format_memory_size(estimate.peak_bytes),
                "{}", verdict.message
            );
            (Some(estimate), Some(verdict))
        };

        let mode = match batch_size_override {
            Some(batch_size) if batch_size < items.len() => {
                ExecutionMode::Batched(BatchPlan::partition(&items, batch_size)?)
            }
            Some(_) => ExecutionMode::SinglePass,
            None => {
                if let (Some(estimate), Some(verdict)) = (&estimate, &memory) {
                    self.refuse_if_danger(estimate, verdict)?;
                }
                ExecutionMode::SinglePass
            }
        };

        if let ExecutionMode::Batched(plan) = &mode {
            info!(
                batch_size = plan.batch_size,
                batches = plan.batch_count(),
                items = items.len(),
                "Planned batched execution"
            );
        } else {
            info!(items = items.len(), "Planned single-pass execution");
        }

        Ok(ExecutionPlan {
            mode,
            items,
            audio_duration,
            transition,
            pacing,
            target_duration,
            max_frames,
            memory,
            estimate,
        })
    }

    /// Batch size that fits `available` bytes, based on the first item.
    fn batch_size_for(&self, estimate: &MemoryEstimate, available: u64) -> usize {
        optimal_batch_size(
            estimate.per_item.first().map(|e| e.bytes),
            available,
            self.config.batch_safety_factor,
            self.config.max_batch_size,
        )
    }

    async fn verdict(&self, estimate: &MemoryEstimate) -> MemoryVerdict {
        match self.memory.available_bytes().await {
            Ok(available) => check_memory_safety(estimate.peak_bytes, available, self.config.memory_safety_factor),
            Err(e) => {
                warn!(error = %e, "Memory introspection unavailable, proceeding");
                unknown_verdict(estimate.peak_bytes, &e.to_string())
            }
        }
    }

    fn refuse_if_danger(&self, estimate: &MemoryEstimate, verdict: &MemoryVerdict) -> PlannerResult<()> {
        if verdict.level != MemoryLevel::Danger {
            return Ok(());
        }
        let available = verdict.available_bytes.unwrap_or_default();
        Err(PlannerError::InsufficientMemory {
            peak: estimate.peak_bytes,
            available,
            recommended_batch_size: self.batch_size_for(estimate, available),
        })
    }
}
