//! Clip selection: one `(start, duration)` window per media item.
//!
//! Selection never fails. Missing or broken score data degrades to a window
//! at the start of the item, and the same inputs always produce the same
//! selections.

use std::sync::Arc;

use reel_media::{MediaProbe, SamplingOptions, ScoreSource};
use reel_models::{ClipSelection, MediaItem, ScoreSeries, SelectionSource};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::pacing::{BeatCursor, BeatGrid, BeatSlot, PacingPlan, BASE_BEATS, EXTENSION_THRESHOLD};
use crate::score_series::{best_window, window_average};

/// Window chosen inside a score series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowChoice {
    pub start: f64,
    pub duration: f64,
    pub score: Option<f64>,
    pub source: SelectionSource,
}

/// Pick the window of length `target` for a video's series.
///
/// - empty series, or one with zero span: start 0, full target, unscored
/// - span shorter than target: the whole span
/// - otherwise the best window
pub fn choose_window(series: &ScoreSeries, target: f64) -> WindowChoice {
    let span = series.span();
    if series.is_empty() || !(span > 0.0) {
        return WindowChoice {
            start: 0.0,
            duration: target,
            score: None,
            source: SelectionSource::Unscored,
        };
    }

    let full_span = WindowChoice {
        start: 0.0,
        duration: span,
        score: None,
        source: SelectionSource::FullSpan,
    };
    if span < target {
        return full_span;
    }

    let best = best_window(series, target);
    if best.is_full_series() {
        return full_span;
    }
    WindowChoice {
        start: best.start,
        duration: target,
        score: Some(best.score),
        source: SelectionSource::BestWindow,
    }
}

/// Try longer beat rungs from the base window's start.
///
/// The longest rung whose average keeps [`EXTENSION_THRESHOLD`] of the base
/// score wins. Returns the choice and the beats it covers.
pub fn extend_on_beats(series: &ScoreSeries, grid: &BeatGrid, cursor: usize, base: WindowChoice) -> (WindowChoice, usize) {
    let Some(base_score) = base.score.filter(|_| base.source == SelectionSource::BestWindow) else {
        return (base, BASE_BEATS);
    };

    let span = series.span();
    let mut choice = (base, BASE_BEATS);
    for rung in grid.extension_rungs() {
        let Some(duration) = grid.interval(cursor, rung) else {
            break;
        };
        if base.start + duration > span {
            continue;
        }
        let score = window_average(series, base.start, duration);
        if score >= base_score * EXTENSION_THRESHOLD {
            choice = (
                WindowChoice {
                    start: base.start,
                    duration,
                    score: Some(score),
                    source: SelectionSource::Extended,
                },
                rung,
            );
        }
    }
    choice
}

/// Chooses clip windows using a score source and a media probe.
#[derive(Clone)]
pub struct ClipSelector {
    scores: Arc<dyn ScoreSource>,
    probe: Arc<dyn MediaProbe>,
    sampling: SamplingOptions,
}

impl ClipSelector {
    pub fn new(scores: Arc<dyn ScoreSource>, probe: Arc<dyn MediaProbe>, sampling: SamplingOptions) -> Self {
        Self {
            scores,
            probe,
            sampling,
        }
    }

    pub fn sampling(&self) -> &SamplingOptions {
        &self.sampling
    }

    /// Select a window for one item.
    ///
    /// Returns `None` only under beat pacing, once the beat grid has no room
    /// left for another clip.
    pub async fn select_item(
        &self,
        item: &MediaItem,
        pacing: &PacingPlan,
        cursor: &mut BeatCursor,
        is_last: bool,
    ) -> Option<ClipSelection> {
        let (choice, beats) = match pacing {
            PacingPlan::Uniform { target } => (self.choose(item, *target).await, None),
            PacingPlan::Beat(grid) => {
                let slot = cursor.next_slot(grid, is_last)?;
                let (choice, beats) = match slot {
                    BeatSlot::Tail { duration, beats } => (self.choose(item, duration).await, beats),
                    BeatSlot::Base { duration } if item.is_video() => {
                        let series = self.series_for(item).await;
                        let base = choose_window(&series, duration);
                        extend_on_beats(&series, grid, cursor.index(), base)
                    }
                    BeatSlot::Base { duration } => (image_choice(duration), BASE_BEATS),
                };
                cursor.advance(beats);
                (choice, Some(beats as u32))
            }
        };

        if choice.source == SelectionSource::Unscored {
            info!(
                item = %item.file_name(),
                duration = choice.duration,
                "No score data, using start of clip"
            );
        }

        let mut selection = ClipSelection::new(item.clone(), choice.start, choice.duration, choice.source);
        if let Some(score) = choice.score {
            selection = selection.with_score(score);
        }
        if let Some(beats) = beats {
            selection = selection.with_beats(beats);
        }
        if let Some(real) = self.real_duration(item).await {
            selection = selection.clamp_to(real);
        }

        metrics::record_selection(selection.source);
        debug!(
            item = %item.file_name(),
            start = selection.start_time,
            duration = selection.duration,
            source = %selection.source,
            "Selected clip"
        );
        Some(selection)
    }

    /// Select windows for every item in order, with a fresh beat cursor.
    pub async fn select_all(&self, items: &[MediaItem], pacing: &PacingPlan) -> Vec<ClipSelection> {
        let mut cursor = BeatCursor::new();
        let mut selections = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.select_item(item, pacing, &mut cursor, index + 1 == items.len()).await {
                Some(selection) => selections.push(selection),
                None => {
                    let skipped = items.len() - index;
                    info!(skipped, "Audio fully covered, skipping remaining items");
                    metrics::record_skipped(skipped);
                    break;
                }
            }
        }
        selections
    }

    async fn choose(&self, item: &MediaItem, target: f64) -> WindowChoice {
        if !item.is_video() {
            return image_choice(target);
        }
        let series = self.series_for(item).await;
        choose_window(&series, target)
    }

    /// Score series for a video; empty when scoring fails.
    async fn series_for(&self, item: &MediaItem) -> ScoreSeries {
        match self.scores.score_series(&item.path, &self.sampling).await {
            Ok(series) => {
                if series.is_empty() {
                    metrics::record_fallback("empty_series");
                }
                series
            }
            Err(e) => {
                warn!(item = %item.file_name(), error = %e, "Scoring failed, falling back to default window");
                metrics::record_fallback("scoring_error");
                ScoreSeries::empty()
            }
        }
    }

    /// Playable duration of a video, when known.
    async fn real_duration(&self, item: &MediaItem) -> Option<f64> {
        if !item.is_video() {
            return None;
        }
        if let Some(duration) = item.duration.filter(|d| *d > 0.0) {
            return Some(duration);
        }
        match self.probe.probe(&item.path).await {
            Ok(info) if info.duration > 0.0 => Some(info.duration),
            Ok(_) => None,
            Err(e) => {
                debug!(item = %item.file_name(), error = %e, "Duration probe failed");
                None
            }
        }
    }
}

fn image_choice(duration: f64) -> WindowChoice {
    WindowChoice {
        start: 0.0,
        duration,
        score: None,
        source: SelectionSource::Image,
    }
}
