//! Reel rendering.
//!
//! A [`Renderer`] turns an ordered list of clip selections into one video.
//! [`FfmpegRenderer`] builds a single filter graph: every clip is letterboxed
//! to a common 16:9 frame, adjacent clips are crossfaded, the result is retimed
//! to the audio length and an optional title is burned in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reel_models::{ClipSelection, EncodingConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{format_secs, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    effective_transition, join_chain, joined_duration, letterbox_chain, retime_factor, title_filter,
    OutputGeometry,
};

/// Background audio for the final reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    /// Length in seconds; the output is cut to this
    pub duration: f64,
}

/// Everything needed to render one video.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub selections: Vec<ClipSelection>,
    /// Attached and used as the output length when present
    pub audio: Option<AudioTrack>,
    pub output: PathBuf,
    /// Crossfade seconds between adjacent clips
    pub transition: f64,
    pub target_width: u32,
    pub title: Option<String>,
    pub encoding: EncodingConfig,
}

/// Result of a finished render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub path: PathBuf,
    /// Output length in seconds
    pub duration: f64,
    pub clip_count: usize,
}

/// Render progress as a fraction in [0, 1].
pub type RenderProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Joins selections into a video file.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest, progress: RenderProgressFn) -> MediaResult<RenderOutput>;
}

/// A fully resolved FFmpeg invocation for a request.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub command: FfmpegCommand,
    pub filter_graph: String,
    /// Seconds of video produced by the graph before any `-t` cut
    pub video_duration: f64,
    /// Final output length
    pub output_duration: f64,
    pub transition: f64,
}

impl RenderPlan {
    pub fn build(request: &RenderRequest) -> MediaResult<Self> {
        if request.selections.is_empty() {
            return Err(MediaError::invalid_request("no clips to render"));
        }
        if let Some(bad) = request.selections.iter().find(|s| !(s.duration > 0.0)) {
            return Err(MediaError::invalid_request(format!(
                "clip {} has non-positive duration {}",
                bad.item.file_name(),
                bad.duration
            )));
        }

        let geometry = OutputGeometry::widescreen(request.target_width);
        let fps = request.encoding.fps;
        let durations: Vec<f64> = request.selections.iter().map(|s| s.duration).collect();
        let transition = effective_transition(request.transition, &durations);

        let mut command = FfmpegCommand::new(&request.output);
        let mut chains = Vec::with_capacity(request.selections.len() + 3);
        let mut labels = Vec::with_capacity(request.selections.len());

        for (i, selection) in request.selections.iter().enumerate() {
            command = command.input_with(&selection.item.path, input_args(selection, fps));
            let label = format!("v{i}");
            chains.push(letterbox_chain(i, geometry, fps, &label));
            labels.push(label);
        }

        let (joined, mut current) = join_chain(&labels, &durations, transition);
        if !joined.is_empty() {
            chains.push(joined);
        }

        let video_duration = joined_duration(&durations, transition);
        let mut post = Vec::new();
        if let Some(audio) = &request.audio {
            if let Some(factor) = retime_factor(video_duration, audio.duration) {
                post.push(format!("setpts=PTS*{factor:.6}"));
            }
        }
        if let Some(title) = request.title.as_deref().filter(|t| !t.trim().is_empty()) {
            post.push(title_filter(title));
        }
        if !post.is_empty() {
            chains.push(format!("[{current}]{}[vout]", post.join(",")));
            current = "vout".to_string();
        }

        let filter_graph = chains.join(";");
        command = command
            .filter_complex(filter_graph.clone())
            .map(format!("[{current}]"))
            .output_args(request.encoding.video_args());

        let output_duration = match &request.audio {
            Some(audio) => {
                let audio_index = request.selections.len();
                command = command
                    .input_with(&audio.path, Vec::<String>::new())
                    .map(format!("{audio_index}:a:0"))
                    .output_args(request.encoding.audio_args())
                    .duration(audio.duration);
                audio.duration
            }
            None => {
                command = command.no_audio().duration(video_duration);
                video_duration
            }
        };

        command = command
            .output_args(request.encoding.extra_args.iter().cloned())
            .output_args(["-movflags", "+faststart"]);

        Ok(Self {
            command,
            filter_graph,
            video_duration,
            output_duration,
            transition,
        })
    }
}

/// Per-input options: images loop for the clip length, videos seek.
fn input_args(selection: &ClipSelection, fps: u32) -> Vec<String> {
    if selection.item.is_video() {
        vec![
            "-ss".to_string(),
            format_secs(selection.start_time),
            "-t".to_string(),
            format_secs(selection.duration),
        ]
    } else {
        vec![
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-t".to_string(),
            format_secs(selection.duration),
        ]
    }
}

/// [`Renderer`] driving the ffmpeg binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRenderer {
    runner: FfmpegRunner,
}

impl FfmpegRenderer {
    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Renderer for FfmpegRenderer {
    async fn render(&self, request: &RenderRequest, progress: RenderProgressFn) -> MediaResult<RenderOutput> {
        let plan = RenderPlan::build(request)?;
        ensure_parent_dir(&request.output).await?;

        info!(
            output = %request.output.display(),
            clips = request.selections.len(),
            transition = plan.transition,
            duration = plan.output_duration,
            "Rendering video"
        );

        let start = Instant::now();
        let total = plan.output_duration;
        let callback = Arc::clone(&progress);
        self.runner
            .run_with_progress(&plan.command, move |p| callback(p.fraction(total)))
            .await?;
        progress(1.0);

        if !request.output.exists() {
            return Err(MediaError::ffmpeg_failed(
                format!("FFmpeg produced no output at {}", request.output.display()),
                None,
                None,
            ));
        }

        info!(
            output = %request.output.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Render complete"
        );

        Ok(RenderOutput {
            path: request.output.clone(),
            duration: plan.output_duration,
            clip_count: request.selections.len(),
        })
    }
}

async fn ensure_parent_dir(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}
