//! Pacing: turning audio length and item count into clip durations.

use reel_models::PacingStrategy;

use crate::error::{PlannerError, PlannerResult};

/// Beats in the shortest beat-synchronized clip.
pub const BASE_BEATS: usize = 4;

/// Longer windows must keep this share of the base window's score.
pub const EXTENSION_THRESHOLD: f64 = 0.85;

/// Stop placing clips once less audio than this remains.
pub const MIN_TAIL_SECONDS: f64 = 2.0;

/// Beat length assumed when fewer than two beats are known.
pub const DEFAULT_BEAT_SECONDS: f64 = 0.5;

/// A strategy resolved against the run's audio and media.
#[derive(Debug, Clone, PartialEq)]
pub enum PacingPlan {
    Uniform { target: f64 },
    Beat(BeatGrid),
}

impl PacingPlan {
    /// Resolve `strategy` for a concrete run.
    pub fn resolve(
        strategy: &PacingStrategy,
        audio_duration: f64,
        item_count: usize,
        overlap: f64,
    ) -> PlannerResult<Self> {
        match strategy {
            PacingStrategy::Uniform => Ok(PacingPlan::Uniform {
                target: uniform_target_duration(audio_duration, item_count, overlap)?,
            }),
            PacingStrategy::BeatSync { beats } => Ok(PacingPlan::Beat(BeatGrid::new(
                beats.clone(),
                audio_duration,
                item_count,
            )?)),
        }
    }

    /// Representative clip length: the uniform target or the longest beat rung.
    pub fn target_duration(&self) -> f64 {
        match self {
            PacingPlan::Uniform { target } => *target,
            PacingPlan::Beat(grid) => grid.max_rung() as f64 * grid.avg_beat(),
        }
    }
}

/// Per-clip duration so that `n` clips overlapping by `overlap` fill `audio_duration`.
///
/// `target = (audio + (n - 1) * overlap) / n`
pub fn uniform_target_duration(audio_duration: f64, item_count: usize, overlap: f64) -> PlannerResult<f64> {
    validate_audio(audio_duration)?;
    if item_count == 0 {
        return Err(PlannerError::NoMedia);
    }
    if !(overlap >= 0.0) || !overlap.is_finite() {
        return Err(PlannerError::invalid_input(format!(
            "transition overlap must be non-negative, got {overlap}"
        )));
    }

    let n = item_count as f64;
    let target = (audio_duration + (n - 1.0) * overlap) / n;
    if item_count > 1 && target <= overlap {
        return Err(PlannerError::invalid_input(format!(
            "{item_count} clips of {target:.2}s cannot overlap by {overlap:.2}s"
        )));
    }
    Ok(target)
}

fn validate_audio(audio_duration: f64) -> PlannerResult<()> {
    if !(audio_duration > 0.0) || !audio_duration.is_finite() {
        return Err(PlannerError::invalid_input(format!(
            "audio duration must be positive, got {audio_duration}"
        )));
    }
    Ok(())
}

/// Snap a beat count down to the rung ladder 4, 8, 12, 16.
pub fn snap_to_rung(target_beats: f64) -> usize {
    if target_beats >= 14.0 {
        16
    } else if target_beats >= 10.0 {
        12
    } else if target_beats >= 6.0 {
        8
    } else {
        BASE_BEATS
    }
}

/// Beat timestamps plus the derived per-clip beat budget.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatGrid {
    beats: Vec<f64>,
    audio_duration: f64,
    avg_beat: f64,
    max_rung: usize,
}

impl BeatGrid {
    pub fn new(mut beats: Vec<f64>, audio_duration: f64, item_count: usize) -> PlannerResult<Self> {
        validate_audio(audio_duration)?;
        if item_count == 0 {
            return Err(PlannerError::NoMedia);
        }
        if beats.iter().any(|b| !b.is_finite() || *b < 0.0) {
            return Err(PlannerError::invalid_input("beat timestamps must be non-negative numbers"));
        }
        beats.retain(|b| *b < audio_duration);
        beats.sort_by(f64::total_cmp);
        if beats.is_empty() {
            return Err(PlannerError::invalid_input("no beats fall inside the audio"));
        }

        let avg_beat = match (beats.first(), beats.last()) {
            (Some(first), Some(last)) if beats.len() >= 2 && last > first => (last - first) / beats.len() as f64,
            _ => DEFAULT_BEAT_SECONDS,
        };
        let per_item = audio_duration / item_count as f64;
        let max_rung = snap_to_rung((per_item / avg_beat).floor());

        Ok(Self {
            beats,
            audio_duration,
            avg_beat,
            max_rung,
        })
    }

    pub fn avg_beat(&self) -> f64 {
        self.avg_beat
    }

    pub fn max_rung(&self) -> usize {
        self.max_rung
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn audio_duration(&self) -> f64 {
        self.audio_duration
    }

    pub fn beat(&self, index: usize) -> Option<f64> {
        self.beats.get(index).copied()
    }

    /// Seconds spanned by `count` beats starting at beat `from`.
    ///
    /// `None` when the grid has no beat at `from + count`.
    pub fn interval(&self, from: usize, count: usize) -> Option<f64> {
        let start = self.beat(from)?;
        let end = self.beat(from + count)?;
        Some(end - start)
    }

    /// Seconds from beat `index` to the end of the audio.
    pub fn tail_from(&self, index: usize) -> Option<f64> {
        self.beat(index).map(|b| self.audio_duration - b)
    }

    /// Extension rungs tried after the base: 2x, 3x and 4x base, up to the max rung.
    pub fn extension_rungs(&self) -> impl Iterator<Item = usize> + '_ {
        (2..=4)
            .map(|m| BASE_BEATS * m)
            .take_while(move |rung| *rung <= self.max_rung)
    }
}

/// Position in the beat grid, carried across items and batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeatCursor {
    index: usize,
}

/// Audio slot reserved for one clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BeatSlot {
    /// A base rung fits; longer rungs may still be tried
    Base { duration: f64 },
    /// The clip takes everything up to the audio end
    Tail { duration: f64, beats: usize },
}

impl BeatCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Slot for the next clip, or `None` when the grid is exhausted.
    pub fn next_slot(&self, grid: &BeatGrid, is_last_item: bool) -> Option<BeatSlot> {
        let tail = grid.tail_from(self.index)?;
        if tail < MIN_TAIL_SECONDS {
            return None;
        }
        let remaining = grid.len() - self.index;
        match grid.interval(self.index, BASE_BEATS) {
            Some(duration) if !is_last_item => Some(BeatSlot::Base { duration }),
            _ => Some(BeatSlot::Tail {
                duration: tail,
                beats: remaining,
            }),
        }
    }

    /// Move past `beats` beats.
    pub fn advance(&mut self, beats: usize) {
        self.index += beats;
    }

    pub fn is_exhausted(&self, grid: &BeatGrid) -> bool {
        self.index >= grid.len()
    }
}
