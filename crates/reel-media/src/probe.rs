//! Media properties via ffprobe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Playable properties of a media file.
///
/// Zero values mean ffprobe did not report the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Coded width in pixels
    pub width: u32,
    /// Coded height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Display rotation in degrees, normalised to 0..360
    pub rotation: i32,
    /// Video codec
    pub codec: String,
}

impl MediaInfo {
    /// Width and height as displayed, after applying rotation.
    pub fn display_dimensions(&self) -> (u32, u32) {
        if self.rotation == 90 || self.rotation == 270 {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Source of media properties.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// [`MediaProbe`] backed by the ffprobe binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeProbe;

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }
}

/// Subset of `ffprobe -show_format -show_streams` JSON.
#[derive(Debug, Deserialize)]
struct ProbeJson {
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: Option<ProbeTags>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

async fn run_ffprobe(path: &Path) -> MediaResult<ProbeJson> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-of", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::probe_failed(
            format!("cannot read {}", path.display()),
            (!stderr.is_empty()).then_some(stderr),
        ));
    }

    Ok(serde_json::from_slice(&output.stdout)?)
}

/// Probe a video or image file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let probe = run_ffprobe(path.as_ref()).await?;
    parse_probe(probe)
}

/// Get the container duration in seconds. Works for audio-only files.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    let probe = run_ffprobe(path).await?;
    let duration = container_duration(&probe)
        .or_else(|| {
            probe
                .streams
                .iter()
                .find_map(|s| s.duration.as_deref().and_then(|d| d.parse::<f64>().ok()))
        })
        .filter(|d| *d > 0.0)
        .ok_or_else(|| MediaError::InvalidMedia(format!("{} has no duration", path.display())))?;
    Ok(duration)
}

fn container_duration(probe: &ProbeJson) -> Option<f64> {
    probe.format.duration.as_deref().and_then(|d| d.parse::<f64>().ok())
}

fn parse_probe(probe: ProbeJson) -> MediaResult<MediaInfo> {
    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidMedia("no video stream".into()))?;

    let duration = container_duration(&probe)
        .or_else(|| video_stream.duration.as_deref().and_then(|d| d.parse::<f64>().ok()))
        .unwrap_or(0.0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    Ok(MediaInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        rotation: stream_rotation(video_stream),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Rotation from the legacy `rotate` tag or the display matrix side data.
fn stream_rotation(stream: &ProbeStream) -> i32 {
    let raw = stream
        .tags
        .as_ref()
        .and_then(|t| t.rotate.as_deref())
        .and_then(|r| r.parse::<f64>().ok())
        .or_else(|| stream.side_data_list.iter().find_map(|s| s.rotation))
        .unwrap_or(0.0);
    (raw.round() as i32).rem_euclid(360)
}

/// Frame rate from `30000/1001` or `29.97` notation; `None` for `0/0`.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => s.trim().parse().ok()?,
    };
    (rate > 0.0 && rate.is_finite()).then_some(rate)
}
