//! Downsampled frame extraction for scoring.
//!
//! Frames are decoded by FFmpeg into raw RGB24 on stdout and handed to the
//! caller one at a time, so at most one frame buffer is alive per video.

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};
use crate::probe::MediaInfo;

/// How a video is sampled for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Requested seconds between samples
    pub interval: f64,
    /// Upper bound on sampled frames per video
    pub max_frames: usize,
    /// Frame height handed to the scorer
    pub downsample_height: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            interval: 1.0,
            max_frames: 100,
            downsample_height: 224,
        }
    }
}

impl SamplingOptions {
    /// Interval widened so `max_frames` samples still cover the whole video.
    pub fn effective_interval(&self, duration: f64) -> f64 {
        let interval = if self.interval > 0.0 { self.interval } else { 1.0 };
        if self.max_frames == 0 || !(duration > 0.0) {
            return interval;
        }
        interval.max(duration / self.max_frames as f64)
    }

    /// Scaled frame size for a source, both dimensions even.
    pub fn frame_size(&self, info: &MediaInfo) -> (u32, u32) {
        let (w, h) = if info.has_resolution() {
            info.display_dimensions()
        } else {
            (1920, 1080)
        };
        let height = even(self.downsample_height.clamp(2, h.max(2)));
        let width = even(((w as f64) * (height as f64) / (h as f64)).round() as u32);
        (width.max(2), height)
    }
}

fn even(v: u32) -> u32 {
    v - v % 2
}

/// One decoded, downsampled RGB24 frame.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Source time in seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB24 pixels, row-major
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }
}

/// Decode sampled frames of `path`, calling `on_frame` for each.
///
/// Returns the number of frames delivered.
pub async fn sample_frames<F>(
    path: &Path,
    info: &MediaInfo,
    options: &SamplingOptions,
    mut on_frame: F,
) -> MediaResult<usize>
where
    F: FnMut(&RawFrame) + Send,
{
    check_ffmpeg()?;

    let interval = options.effective_interval(info.duration);
    let (width, height) = options.frame_size(info);
    let bytes_per_frame = (width * height * 3) as usize;

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .args([
            "-vf",
            &format!("fps=1/{:.6},scale={}:{}", interval, width, height),
            "-frames:v",
            &options.max_frames.max(1).to_string(),
            "-pix_fmt",
            "rgb24",
            "-f",
            "rawvideo",
            "-",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    debug!(
        path = %path.display(),
        interval,
        width,
        height,
        "Sampling frames"
    );

    let mut child = cmd
        .spawn()
        .map_err(|e| MediaError::ffmpeg_failed(format!("Failed to spawn FFmpeg: {}", e), None, None))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;

    let mut reader = BufReader::new(stdout);
    let mut frame = RawFrame {
        timestamp: 0.0,
        width,
        height,
        data: vec![0u8; bytes_per_frame],
    };
    let mut delivered = 0usize;

    loop {
        match reader.read_exact(&mut frame.data).await {
            Ok(_) => {
                frame.timestamp = delivered as f64 * interval;
                on_frame(&frame);
                delivered += 1;
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                return Err(MediaError::ffmpeg_failed(
                    format!("Failed to read FFmpeg output: {}", e),
                    None,
                    None,
                ))
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| MediaError::ffmpeg_failed(format!("FFmpeg process error: {}", e), None, None))?;

    if !status.success() {
        if delivered == 0 {
            return Err(MediaError::ffmpeg_failed(
                format!("Frame sampling failed for {}", path.display()),
                None,
                status.code(),
            ));
        }
        warn!(
            path = %path.display(),
            exit_code = ?status.code(),
            frames = delivered,
            "FFmpeg returned non-zero status after partial decode"
        );
    }

    Ok(delivered)
}
