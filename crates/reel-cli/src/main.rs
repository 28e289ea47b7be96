//! Highlight reel command-line tool.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::{
    check_ffmpeg, check_ffprobe, probe_duration, scan_media, AudioTrack, ExposureScorer, FfmpegRenderer, FfprobeProbe,
    SampledScoreSource, SystemMemory,
};
use reel_models::{ExecutionPlan, MediaItem, ProgressEvent, ProgressPhase};
use reel_planner::{
    check_memory_safety, format_memory_size, optimal_batch_size, BatchScheduler, PacingPlan, PacingStrategy, PlanRequest, Planner,
    PlannerConfig, PlannerError, ProgressCallback, RenderJob,
};

/// Clip length assumed by `estimate` when no audio is given.
const DEFAULT_ESTIMATE_CLIP_SECS: f64 = 5.0;
/// Per-file rows shown by `estimate`.
const ESTIMATE_PREVIEW_ROWS: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "Turn a folder of footage and a song into a highlight reel")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select clips and render the highlight reel.
    Render(RenderArgs),
    /// Print the execution plan as JSON without rendering.
    Plan(PlanArgs),
    /// Report estimated memory use for a media folder.
    Estimate(EstimateArgs),
    /// Print the JSON schema of the execution plan.
    Schema,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Folder of videos and photos.
    media_dir: PathBuf,

    /// Background audio track.
    #[arg(long)]
    audio: Option<PathBuf>,

    /// Audio length in seconds, instead of probing `--audio`.
    #[arg(long)]
    audio_duration: Option<f64>,

    /// JSON array of beat timestamps in seconds; enables beat-synchronized pacing.
    #[arg(long)]
    beats: Option<PathBuf>,

    /// Crossfade between clips in seconds.
    #[arg(long)]
    transition: Option<f64>,

    /// Frames scored per video (10-500).
    #[arg(long)]
    max_frames: Option<usize>,

    /// Output width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Directory for temporary batch files.
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Items per batch; forces batched rendering when smaller than the item count.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Skip the memory estimate.
    #[arg(long)]
    skip_memory_check: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    plan: PlanArgs,

    /// Output video; defaults to highlight_<title>.mp4.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Title shown over the first seconds.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    #[command(flatten)]
    input: InputArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Render(args) => cmd_render(args).await,
        Command::Plan(args) => cmd_plan(args).await,
        Command::Estimate(args) => cmd_estimate(args).await,
        Command::Schema => cmd_schema(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {e:#}");
            let actionable = e
                .downcast_ref::<PlannerError>()
                .is_some_and(PlannerError::is_insufficient_memory);
            if actionable {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Coloured output for terminals, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reel=info,warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

/// Environment config with command-line overrides applied.
fn load_config(input: &InputArgs) -> anyhow::Result<PlannerConfig> {
    let mut config = PlannerConfig::from_env();
    if let Some(transition) = input.transition {
        config.transition = transition;
    }
    if let Some(max_frames) = input.max_frames {
        config.max_frames = max_frames;
    }
    if let Some(width) = input.width {
        config.target_width = width;
    }
    if let Some(work_dir) = &input.work_dir {
        config.work_dir = Some(work_dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn scan(input: &InputArgs) -> anyhow::Result<Vec<MediaItem>> {
    let items = scan_media(&input.media_dir)
        .with_context(|| format!("scan media folder '{}'", input.media_dir.display()))?;
    info!(count = items.len(), dir = %input.media_dir.display(), "Scanned media");
    Ok(items)
}

/// Audio length from `--audio-duration` or by probing `--audio`.
async fn audio_duration(input: &InputArgs) -> anyhow::Result<Option<f64>> {
    if let Some(duration) = input.audio_duration {
        return Ok(Some(duration));
    }
    let Some(audio) = &input.audio else {
        return Ok(None);
    };
    let duration = probe_duration(audio)
        .await
        .with_context(|| format!("probe audio '{}'", audio.display()))?;
    Ok(Some(duration))
}

fn read_beats(path: &Path) -> anyhow::Result<Vec<f64>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read beats '{}'", path.display()))?;
    let beats: Vec<f64> = serde_json::from_str(&content).with_context(|| "parse beats JSON")?;
    Ok(beats)
}

fn pacing(input: &InputArgs) -> anyhow::Result<PacingStrategy> {
    match &input.beats {
        Some(path) => Ok(PacingStrategy::BeatSync {
            beats: read_beats(path)?,
        }),
        None => Ok(PacingStrategy::Uniform),
    }
}

fn planner(config: &PlannerConfig) -> Planner {
    Planner::new(Arc::new(FfprobeProbe), Arc::new(SystemMemory::new()), config.clone())
}

async fn build_plan(args: &PlanArgs, config: &PlannerConfig) -> anyhow::Result<ExecutionPlan> {
    let items = scan(&args.input)?;
    let audio = audio_duration(&args.input)
        .await?
        .context("an audio track is required: pass --audio or --audio-duration")?;
    let plan = planner(config)
        .plan(PlanRequest {
            items,
            audio_duration: audio,
            transition: config.transition,
            max_frames: config.max_frames,
            batch_size_override: args.batch_size,
            skip_memory_check: args.skip_memory_check,
            pacing: pacing(&args.input)?,
        })
        .await?;
    Ok(plan)
}

async fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let config = load_config(&args.input)?;
    let plan = build_plan(&args, &config).await?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    check_ffmpeg()?;
    check_ffprobe()?;

    let config = load_config(&args.plan.input)?;
    let plan = build_plan(&args.plan, &config).await?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_name(args.title.as_deref())));
    let mut job = RenderJob::new(&output);
    if let Some(path) = &args.plan.input.audio {
        job = job.with_audio(AudioTrack {
            path: path.clone(),
            duration: plan.audio_duration,
        });
    }
    if let Some(title) = &args.title {
        job = job.with_title(title.clone());
    }

    let scores = SampledScoreSource::new(Arc::new(ExposureScorer::default()));
    let scheduler = BatchScheduler::new(
        Arc::new(scores),
        Arc::new(FfprobeProbe),
        Arc::new(FfmpegRenderer::with_runner(config.ffmpeg_runner())),
        config,
    );
    let summary = scheduler.execute(&plan, &job, console_progress()).await?;

    println!(
        "Created {} ({} clips, {:.1}s, {} batch{})",
        summary.output.display(),
        summary.clip_count,
        summary.duration,
        summary.batch_count,
        if summary.batch_count == 1 { "" } else { "es" }
    );
    if summary.skipped > 0 {
        println!("{} item(s) left out: the audio was already covered", summary.skipped);
    }
    Ok(())
}

async fn cmd_estimate(args: EstimateArgs) -> anyhow::Result<()> {
    let config = load_config(&args.input)?;
    let items = scan(&args.input)?;
    anyhow::ensure!(!items.is_empty(), PlannerError::NoMedia);

    let clip_duration = match audio_duration(&args.input).await? {
        Some(audio) => PacingPlan::resolve(&pacing(&args.input)?, audio, items.len(), config.transition)?
            .target_duration(),
        None => DEFAULT_ESTIMATE_CLIP_SECS,
    };

    let memory = SystemMemory::new()
        .snapshot()
        .await
        .context("read system memory")?;
    let estimate = planner(&config).estimator().estimate(&items, clip_duration).await;
    let verdict = check_memory_safety(estimate.peak_bytes, memory.available, config.memory_safety_factor);
    let batch_size = optimal_batch_size(
        estimate.per_item.first().map(|e| e.bytes),
        memory.available,
        config.batch_safety_factor,
        config.max_batch_size,
    );

    println!("System memory");
    println!("  Total:     {}", format_memory_size(memory.total));
    println!("  Available: {}", format_memory_size(memory.available));
    println!("  Used:      {:.1}%", memory.used_percent());
    println!();
    println!("Estimate for {} items at {:.1}s per clip", items.len(), clip_duration);
    println!("  Total: {}", format_memory_size(estimate.total_bytes));
    println!("  Peak:  {}", format_memory_size(estimate.peak_bytes));
    println!("  Verdict: {} ({})", verdict.level, verdict.message);
    println!("  Recommended batch size: {batch_size}");
    println!();
    println!("Per-file estimates:");
    for item in estimate.per_item.iter().take(ESTIMATE_PREVIEW_ROWS) {
        let name = item
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.path.display().to_string());
        println!("  {:<40} {}", name, format_memory_size(item.bytes));
    }
    if estimate.per_item.len() > ESTIMATE_PREVIEW_ROWS {
        println!("  ... and {} more", estimate.per_item.len() - ESTIMATE_PREVIEW_ROWS);
    }
    Ok(())
}

fn cmd_schema() -> anyhow::Result<()> {
    let schema = schemars::schema_for!(ExecutionPlan);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Single updating progress line on stderr.
fn console_progress() -> ProgressCallback {
    Arc::new(|event: ProgressEvent| {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r[{:>3}%] {:<16} {:<60}", event.percent, event.phase.as_str(), truncate(&event.message, 60));
        if event.phase == ProgressPhase::Complete {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    })
}

fn truncate(message: &str, width: usize) -> String {
    if message.chars().count() <= width {
        return message.to_string();
    }
    let mut short: String = message.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

/// `highlight_<title>.mp4` with spaces and dashes as underscores.
fn default_output_name(title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("highlight_{}.mp4", title.replace([' ', '-'], "_")),
        None => "highlight_video.mp4".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_output_name() {
        assert_eq!(default_output_name(Some("Summer Trip - 2024")), "highlight_Summer_Trip___2024.mp4");
        assert_eq!(default_output_name(Some("  ")), "highlight_video.mp4");
        assert_eq!(default_output_name(None), "highlight_video.mp4");
    }

    #[test]
    fn test_read_beats() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("beats.json");
        std::fs::write(&path, "[0.0, 0.52, 1.04]").unwrap();
        assert_eq!(read_beats(&path).unwrap(), vec![0.0, 0.52, 1.04]);

        std::fs::write(&path, "{\"beats\": []}").unwrap();
        assert!(read_beats(&path).is_err());
    }

    #[test]
    fn test_render_args_parse() {
        let cli = Cli::try_parse_from([
            "reel",
            "render",
            "footage",
            "--audio",
            "song.mp3",
            "--batch-size",
            "10",
            "--title",
            "Trip",
        ])
        .unwrap();
        let Command::Render(args) = cli.cmd else {
            panic!("expected render");
        };
        assert_eq!(args.plan.batch_size, Some(10));
        assert_eq!(args.plan.input.media_dir, PathBuf::from("footage"));
        assert_eq!(args.title.as_deref(), Some("Trip"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
