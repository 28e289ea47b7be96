//! Visual appeal scoring.
//!
//! A [`ScoreSource`] turns a media file into a [`ScoreSeries`]. The built-in
//! [`SampledScoreSource`] samples frames with FFmpeg and rates each one with a
//! [`FrameScorer`]; heavier models plug in behind the same trait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reel_models::{ScoreSample, ScoreSeries};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::frames::{sample_frames, RawFrame, SamplingOptions};
use crate::probe::{FfprobeProbe, MediaProbe};

/// Rates a single frame.
pub trait FrameScorer: Send + Sync {
    /// Visual appeal of `frame`, typically in [0, 1].
    fn score(&self, frame: &RawFrame) -> f64;

    fn name(&self) -> &'static str;
}

/// Produces a score series for a whole media file.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn score_series(&self, path: &Path, options: &SamplingOptions) -> MediaResult<ScoreSeries>;
}

/// Prefers well-exposed, contrasty, colourful frames.
#[derive(Debug, Clone, Copy)]
pub struct ExposureScorer {
    /// Mean luma considered ideal, in [0, 1]
    pub target_luma: f64,
    pub brightness_weight: f64,
    pub contrast_weight: f64,
    pub saturation_weight: f64,
}

impl Default for ExposureScorer {
    fn default() -> Self {
        Self {
            target_luma: 0.55,
            brightness_weight: 0.4,
            contrast_weight: 0.3,
            saturation_weight: 0.3,
        }
    }
}

impl FrameScorer for ExposureScorer {
    fn score(&self, frame: &RawFrame) -> f64 {
        let n = frame.pixel_count().min(frame.data.len() / 3);
        if n == 0 {
            return 0.0;
        }

        let mut luma_sum = 0.0;
        let mut luma_sq_sum = 0.0;
        let mut sat_sum = 0.0;

        for px in frame.data.chunks_exact(3).take(n) {
            let (r, g, b) = (px[0] as f64, px[1] as f64, px[2] as f64);
            // Rec. 601 luma
            let y = (0.299 * r + 0.587 * g + 0.114 * b) / 255.0;
            luma_sum += y;
            luma_sq_sum += y * y;

            let max = r.max(g).max(b);
            let min = r.min(g).min(b);
            if max > 0.0 {
                sat_sum += (max - min) / max;
            }
        }

        let count = n as f64;
        let mean = luma_sum / count;
        let variance = (luma_sq_sum / count - mean * mean).max(0.0);
        // Stddev of a [0, 1] signal tops out at 0.5
        let contrast = (variance.sqrt() * 2.0).min(1.0);
        let saturation = sat_sum / count;
        let brightness = (1.0 - (mean - self.target_luma).abs() / self.target_luma.max(1.0 - self.target_luma))
            .clamp(0.0, 1.0);

        let total_weight = self.brightness_weight + self.contrast_weight + self.saturation_weight;
        if total_weight <= 0.0 {
            return 0.0;
        }
        (self.brightness_weight * brightness + self.contrast_weight * contrast + self.saturation_weight * saturation)
            / total_weight
    }

    fn name(&self) -> &'static str {
        "exposure"
    }
}

/// Samples frames with FFmpeg and scores them with `S`.
pub struct SampledScoreSource<S> {
    scorer: Arc<S>,
    probe: Arc<dyn MediaProbe>,
}

impl<S: FrameScorer> SampledScoreSource<S> {
    pub fn new(scorer: Arc<S>) -> Self {
        Self {
            scorer,
            probe: Arc::new(FfprobeProbe),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }
}

#[async_trait]
impl<S: FrameScorer + 'static> ScoreSource for SampledScoreSource<S> {
    async fn score_series(&self, path: &Path, options: &SamplingOptions) -> MediaResult<ScoreSeries> {
        let info = self.probe.probe(path).await?;
        let scorer = Arc::clone(&self.scorer);

        let mut samples = Vec::with_capacity(options.max_frames);
        let frames = sample_frames(path, &info, options, |frame| {
            samples.push(ScoreSample::new(frame.timestamp, scorer.score(frame)));
        })
        .await?;

        debug!(
            path = %path.display(),
            frames,
            scorer = self.scorer.name(),
            "Scored frames"
        );

        ScoreSeries::new(samples).map_err(|e| MediaError::scoring_failed(e.to_string()))
    }
}
