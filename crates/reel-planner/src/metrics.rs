//! Planner metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops unless the host
//! installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};
use reel_models::{MemoryLevel, SelectionSource};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Clips selected, by selection source.
    pub const CLIPS_SELECTED_TOTAL: &str = "reel_clips_selected_total";

    /// Scoring fallbacks, by reason.
    pub const SELECTION_FALLBACKS_TOTAL: &str = "reel_selection_fallbacks_total";

    /// Items dropped because the beat grid ran out.
    pub const ITEMS_SKIPPED_TOTAL: &str = "reel_items_skipped_total";

    /// Batch intermediates rendered.
    pub const BATCHES_RENDERED_TOTAL: &str = "reel_batches_rendered_total";

    /// Memory verdicts, by level.
    pub const MEMORY_VERDICTS_TOTAL: &str = "reel_memory_verdicts_total";

    /// Render latency in seconds, by stage.
    pub const RENDER_SECONDS: &str = "reel_render_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_selection(source: SelectionSource) {
    counter!(
        names::CLIPS_SELECTED_TOTAL,
        "source" => source.as_str()
    )
    .increment(1);
}

/// `reason` is a short static tag such as `"empty_series"`.
pub fn record_fallback(reason: &'static str) {
    counter!(
        names::SELECTION_FALLBACKS_TOTAL,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_skipped(count: usize) {
    counter!(names::ITEMS_SKIPPED_TOTAL).increment(count as u64);
}

pub fn record_batch_rendered() {
    counter!(names::BATCHES_RENDERED_TOTAL).increment(1);
}

pub fn record_memory_verdict(level: MemoryLevel) {
    counter!(
        names::MEMORY_VERDICTS_TOTAL,
        "level" => level.as_str()
    )
    .increment(1);
}

/// `stage` is `"batch"`, `"concat"` or `"single_pass"`.
pub fn record_render(stage: &'static str, elapsed: Duration) {
    histogram!(
        names::RENDER_SECONDS,
        "stage" => stage
    )
    .record(elapsed.as_secs_f64());
}
