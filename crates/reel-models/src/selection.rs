//! Clip selections produced by the selector and consumed by the renderer.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::media::MediaItem;

/// How a selection's window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// Still image, shown from the start
    Image,
    /// Highest scoring window of the target length
    BestWindow,
    /// Best window extended to a longer beat rung
    Extended,
    /// Scored span shorter than the target, whole span used
    FullSpan,
    /// No score data, default window from the start
    Unscored,
}

impl SelectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionSource::Image => "image",
            SelectionSource::BestWindow => "best_window",
            SelectionSource::Extended => "extended",
            SelectionSource::FullSpan => "full_span",
            SelectionSource::Unscored => "unscored",
        }
    }
}

impl fmt::Display for SelectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(start, duration)` window into one media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSelection {
    /// Source media
    pub item: MediaItem,
    /// Offset into the source in seconds
    pub start_time: f64,
    /// Clip length in seconds
    pub duration: f64,
    /// Average score of the chosen window, if scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Beats covered by the clip under beat-synchronized pacing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beats: Option<u32>,
    /// Selection path taken
    pub source: SelectionSource,
}

impl ClipSelection {
    pub fn new(item: MediaItem, start_time: f64, duration: f64, source: SelectionSource) -> Self {
        Self {
            item,
            start_time: start_time.max(0.0),
            duration,
            score: None,
            beats: None,
            source,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_beats(mut self, beats: u32) -> Self {
        self.beats = Some(beats);
        self
    }

    /// End of the window in source time.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Keep a video window inside the source's real duration.
    ///
    /// The start is pulled back first; the clip is only shortened when it is
    /// longer than the whole source. Images are left untouched.
    pub fn clamp_to(mut self, real_duration: f64) -> Self {
        if !self.item.is_video() || !(real_duration > 0.0) {
            return self;
        }
        if self.end_time() > real_duration {
            self.start_time = (real_duration - self.duration).max(0.0);
        }
        if self.duration > real_duration {
            self.duration = real_duration;
        }
        self
    }
}
