//! Execution plans: how a run will be rendered.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::media::MediaItem;
use crate::memory::{MemoryEstimate, MemoryVerdict};
use crate::pacing::PacingStrategy;

/// Media split into contiguous, bounded batches.
///
/// Batches partition the input in original order; every item appears exactly
/// once and no batch holds more than `batch_size` items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub batches: Vec<Vec<MediaItem>>,
}

impl BatchPlan {
    /// Chunk `items` into batches of at most `batch_size`.
    pub fn partition(items: &[MediaItem], batch_size: usize) -> ModelResult<Self> {
        if batch_size == 0 {
            return Err(ModelError::ZeroBatchSize);
        }
        Ok(Self {
            batch_size,
            batches: items.chunks(batch_size).map(<[MediaItem]>::to_vec).collect(),
        })
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn item_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

/// Rendering shape for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Select and render everything at once
    SinglePass,
    /// Render bounded batches, then concatenate
    Batched(BatchPlan),
}

impl ExecutionMode {
    pub fn is_batched(&self) -> bool {
        matches!(self, ExecutionMode::Batched(_))
    }
}

/// Everything the scheduler needs to execute a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionPlan {
    pub mode: ExecutionMode,
    /// Media in scan order
    pub items: Vec<MediaItem>,
    /// Background audio length in seconds
    pub audio_duration: f64,
    /// Crossfade length in seconds
    pub transition: f64,
    /// How clip durations are paced when the plan runs
    #[serde(default)]
    pub pacing: PacingStrategy,
    /// Uniform per-clip target, or the average beat-derived target
    pub target_duration: f64,
    /// Frame cap for scoring each video
    pub max_frames: usize,
    /// Memory verdict, absent when the check was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<MemoryEstimate>,
}

impl ExecutionPlan {
    pub fn batch_count(&self) -> usize {
        match &self.mode {
            ExecutionMode::SinglePass => 1,
            ExecutionMode::Batched(plan) => plan.batch_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use chrono::Utc;

    fn items(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::new(format!("/m/{i:02}.mp4"), MediaKind::Video, Utc::now()))
            .collect()
    }

    #[test]
    fn test_partition_covers_in_order() {
        let media = items(7);
        let plan = BatchPlan::partition(&media, 3).unwrap();
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.batches[2].len(), 1);
        let flat: Vec<_> = plan.batches.iter().flatten().cloned().collect();
        assert_eq!(flat, media);
    }

    #[test]
    fn test_partition_count_is_ceiling() {
        for n in 0..20 {
            for b in 1..8 {
                let plan = BatchPlan::partition(&items(n), b).unwrap();
                assert_eq!(plan.batch_count(), n.div_ceil(b));
                assert_eq!(plan.item_count(), n);
                assert!(plan.batches.iter().all(|batch| batch.len() <= b));
            }
        }
    }

    #[test]
    fn test_partition_rejects_zero() {
        assert_eq!(
            BatchPlan::partition(&items(3), 0).unwrap_err(),
            ModelError::ZeroBatchSize
        );
    }

    #[test]
    fn test_mode_serializes_tagged() {
        let json = serde_json::to_value(ExecutionMode::SinglePass).unwrap();
        assert_eq!(json["mode"], "single_pass");
    }
}
