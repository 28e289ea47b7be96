//! Planner configuration.

use std::path::PathBuf;
use std::time::Duration;

use reel_media::{FfmpegRunner, SamplingOptions};
use reel_models::EncodingConfig;

use crate::error::{PlannerError, PlannerResult};

/// Bounds for the per-video frame cap.
pub const MIN_MAX_FRAMES: usize = 10;
pub const MAX_MAX_FRAMES: usize = 500;

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Output width in pixels; height follows 16:9
    pub target_width: u32,
    /// Crossfade between adjacent clips, in seconds
    pub transition: f64,
    /// Requested seconds between scored frames
    pub sample_interval: f64,
    /// Frame cap per video
    pub max_frames: usize,
    /// Frame height handed to the scorer
    pub downsample_height: u32,
    /// Fraction of available memory a single pass may use without warning
    pub memory_safety_factor: f64,
    /// Fraction of available memory budgeted for one batch
    pub batch_safety_factor: f64,
    /// Upper bound for computed batch sizes
    pub max_batch_size: usize,
    /// Parent for temporary batch artifacts; system temp dir when unset
    pub work_dir: Option<PathBuf>,
    /// Kill a single ffmpeg render after this long; unbounded when unset
    pub render_timeout: Option<Duration>,
    pub encoding: EncodingConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            target_width: 1920,
            transition: 0.5,
            sample_interval: 1.0,
            max_frames: 100,
            downsample_height: 224,
            memory_safety_factor: 0.8,
            batch_safety_factor: 0.7,
            max_batch_size: 100,
            work_dir: None,
            render_timeout: None,
            encoding: EncodingConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            target_width: std::env::var("REEL_TARGET_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.target_width),
            transition: std::env::var("REEL_TRANSITION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.transition),
            sample_interval: std::env::var("REEL_SAMPLE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_interval),
            max_frames: std::env::var("REEL_MAX_FRAMES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_frames),
            downsample_height: std::env::var("REEL_DOWNSAMPLE_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.downsample_height),
            memory_safety_factor: std::env::var("REEL_MEMORY_SAFETY_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.memory_safety_factor),
            batch_safety_factor: std::env::var("REEL_BATCH_SAFETY_FACTOR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.batch_safety_factor),
            max_batch_size: std::env::var("REEL_MAX_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_batch_size),
            work_dir: std::env::var("REEL_WORK_DIR").ok().map(PathBuf::from),
            render_timeout: parse_timeout_secs(std::env::var("REEL_RENDER_TIMEOUT_SECS").ok().as_deref()),
            encoding: defaults.encoding,
        }
    }

    /// Reject settings the planner cannot work with.
    pub fn validate(&self) -> PlannerResult<()> {
        if self.target_width < 2 {
            return Err(PlannerError::invalid_input("target width must be at least 2 pixels"));
        }
        if !(self.transition >= 0.0) || !self.transition.is_finite() {
            return Err(PlannerError::invalid_input(format!(
                "transition must be a non-negative number of seconds, got {}",
                self.transition
            )));
        }
        if !(self.sample_interval > 0.0) {
            return Err(PlannerError::invalid_input("sample interval must be positive"));
        }
        if !(MIN_MAX_FRAMES..=MAX_MAX_FRAMES).contains(&self.max_frames) {
            return Err(PlannerError::invalid_input(format!(
                "max frames must be between {MIN_MAX_FRAMES} and {MAX_MAX_FRAMES}, got {}",
                self.max_frames
            )));
        }
        for (name, factor) in [
            ("memory safety factor", self.memory_safety_factor),
            ("batch safety factor", self.batch_safety_factor),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return Err(PlannerError::invalid_input(format!(
                    "{name} must be in (0, 1], got {factor}"
                )));
            }
        }
        if self.max_batch_size == 0 {
            return Err(PlannerError::invalid_input("max batch size must be at least 1"));
        }
        Ok(())
    }

    /// ffmpeg runner honouring `render_timeout`.
    pub fn ffmpeg_runner(&self) -> FfmpegRunner {
        match self.render_timeout {
            Some(timeout) => FfmpegRunner::new().with_timeout(timeout),
            None => FfmpegRunner::new(),
        }
    }

    /// Frame sampling settings for the score source.
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            interval: self.sample_interval,
            max_frames: self.max_frames,
            downsample_height: self.downsample_height,
        }
    }
}

/// Whole seconds; zero or unparsable means no limit.
fn parse_timeout_secs(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
