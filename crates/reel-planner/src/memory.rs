//! Memory estimation and safety classification.
//!
//! The cost model assumes the renderer keeps a rolling two-second buffer of
//! decoded RGB frames per clip at the output resolution, doubled for
//! processing copies. Assembly briefly holds resized copies alongside the
//! originals (x1.5), and a fixed overhead covers the scoring model and
//! runtime.

use std::path::Path;
use std::sync::Arc;

use reel_media::{MediaInfo, MediaProbe};
use reel_models::{ItemEstimate, MediaItem, MemoryEstimate, MemoryLevel, MemoryVerdict};
use tracing::{debug, warn};

pub const GIB: u64 = 1024 * 1024 * 1024;
pub const MIB: u64 = 1024 * 1024;

/// Scoring model plus runtime.
pub const BASE_OVERHEAD_BYTES: u64 = 2 * GIB;
/// Resized copies held alongside originals during assembly.
pub const ASSEMBLY_FACTOR: f64 = 1.5;
/// Seconds of decoded frames buffered per clip.
pub const BUFFER_SECONDS: f64 = 2.0;
const BYTES_PER_PIXEL: u64 = 3;
const PROCESSING_COPIES: u64 = 2;

/// Assumed properties when probing fails.
pub const FALLBACK_WIDTH: u32 = 1920;
pub const FALLBACK_HEIGHT: u32 = 1080;
pub const FALLBACK_FPS: f64 = 30.0;
pub const FALLBACK_DURATION: f64 = 10.0;

/// Bytes needed to buffer one clip.
///
/// `width * height * 3 * min(floor(duration * fps), floor(2 * fps)) * 2`
pub fn estimate_clip_memory(width: u32, height: u32, duration: f64, fps: f64) -> u64 {
    let total_frames = (duration.max(0.0) * fps.max(0.0)).floor() as u64;
    let buffer_frames = total_frames.min((BUFFER_SECONDS * fps.max(0.0)).floor() as u64);
    width as u64 * height as u64 * BYTES_PER_PIXEL * buffer_frames * PROCESSING_COPIES
}

/// Scale so the wider dimension equals `target_width`, keeping aspect.
pub fn scale_to_target(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return scale_to_target(FALLBACK_WIDTH, FALLBACK_HEIGHT, target_width);
    }
    let target = target_width as u64;
    if width >= height {
        (target_width, (height as u64 * target / width as u64) as u32)
    } else {
        ((width as u64 * target / height as u64) as u32, target_width)
    }
}

/// Peak bytes for a set whose per-item costs sum to `total`.
pub fn peak_memory(total: u64) -> u64 {
    (total as f64 * ASSEMBLY_FACTOR) as u64 + BASE_OVERHEAD_BYTES
}

/// Classify `peak` against `available` memory.
///
/// Safe at or below `available * safety_factor`, warning at or below
/// `available`, danger above. Advisory only.
pub fn check_memory_safety(peak: u64, available: u64, safety_factor: f64) -> MemoryVerdict {
    let safe_limit = (available as f64 * safety_factor) as u64;
    let (level, message) = if peak <= safe_limit {
        (
            MemoryLevel::Safe,
            format!(
                "Memory usage OK: {} / {} available",
                format_memory_size(peak),
                format_memory_size(available)
            ),
        )
    } else if peak <= available {
        (
            MemoryLevel::Warning,
            format!(
                "High memory usage: {} / {} available. Close other applications.",
                format_memory_size(peak),
                format_memory_size(available)
            ),
        )
    } else {
        (
            MemoryLevel::Danger,
            format!(
                "Insufficient memory: {} needed but only {} available. Use batch processing.",
                format_memory_size(peak),
                format_memory_size(available)
            ),
        )
    };

    MemoryVerdict {
        level,
        estimated_bytes: peak,
        available_bytes: Some(available),
        message,
    }
}

/// Verdict when host memory cannot be read.
pub fn unknown_verdict(peak: u64, reason: &str) -> MemoryVerdict {
    MemoryVerdict {
        level: MemoryLevel::Unknown,
        estimated_bytes: peak,
        available_bytes: None,
        message: format!("Memory check unavailable: {reason}"),
    }
}

/// Human-readable size with two decimals: B, KB, MB, GB, TB, PB.
pub fn format_memory_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} {}", UNITS[UNITS.len() - 1])
}

/// Per-item memory estimator backed by a [`MediaProbe`].
#[derive(Clone)]
pub struct MemoryEstimator {
    probe: Arc<dyn MediaProbe>,
    target_width: u32,
}

impl MemoryEstimator {
    pub fn new(probe: Arc<dyn MediaProbe>, target_width: u32) -> Self {
        Self { probe, target_width }
    }

    /// Cost of one item. Images are held for `clip_duration` at 1 fps.
    pub async fn estimate_item(&self, item: &MediaItem, clip_duration: f64) -> ItemEstimate {
        let info = self.probe_or_fallback(&item.path).await;
        let (natural_width, natural_height) = info.display_dimensions();
        let (width, height) = scale_to_target(natural_width, natural_height, self.target_width);

        let bytes = if item.is_video() {
            let duration = item.duration.filter(|d| *d > 0.0).unwrap_or(info.duration);
            estimate_clip_memory(width, height, duration, info.fps)
        } else {
            estimate_clip_memory(width, height, clip_duration, 1.0)
        };

        debug!(
            path = %item.path.display(),
            width,
            height,
            bytes,
            "Estimated item memory"
        );

        ItemEstimate {
            path: item.path.clone(),
            bytes,
        }
    }

    /// Total and peak cost for a media set.
    pub async fn estimate(&self, items: &[MediaItem], clip_duration: f64) -> MemoryEstimate {
        let mut per_item = Vec::with_capacity(items.len());
        for item in items {
            per_item.push(self.estimate_item(item, clip_duration).await);
        }
        let total_bytes = per_item.iter().map(|e| e.bytes).sum();
        MemoryEstimate {
            per_item,
            total_bytes,
            peak_bytes: peak_memory(total_bytes),
        }
    }

    async fn probe_or_fallback(&self, path: &Path) -> MediaInfo {
        let fallback = MediaInfo {
            duration: FALLBACK_DURATION,
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
            fps: FALLBACK_FPS,
            ..Default::default()
        };

        match self.probe.probe(path).await {
            Ok(info) => MediaInfo {
                duration: if info.duration > 0.0 { info.duration } else { fallback.duration },
                fps: if info.fps > 0.0 { info.fps } else { fallback.fps },
                width: if info.has_resolution() { info.width } else { fallback.width },
                height: if info.has_resolution() { info.height } else { fallback.height },
                ..info
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Probe failed, assuming 1080p/30fps/10s");
                fallback
            }
        }
    }
}
