//! Media collaborators for the highlight reel planner.
//!
//! This crate provides:
//! - Media folder scanning
//! - FFprobe-based probing (duration, resolution, rotation, fps)
//! - FFmpeg command building with progress parsing
//! - Frame sampling and frame scoring
//! - Filter graph construction and the FFmpeg renderer
//! - Host memory introspection

pub mod command;
pub mod error;
pub mod filters;
pub mod frames;
pub mod probe;
pub mod progress;
pub mod render;
pub mod scan;
pub mod scorer;
pub mod sysmem;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{RawFrame, SamplingOptions};
pub use probe::{probe_duration, probe_media, FfprobeProbe, MediaInfo, MediaProbe};
pub use progress::FfmpegProgress;
pub use render::{AudioTrack, FfmpegRenderer, RenderOutput, RenderProgressFn, RenderRequest, Renderer};
pub use scan::scan_media;
pub use scorer::{ExposureScorer, FrameScorer, SampledScoreSource, ScoreSource};
pub use sysmem::{MemInfo, MemoryProbe, SystemMemory};
