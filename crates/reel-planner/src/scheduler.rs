//! Execution of a planned run.
//!
//! Single pass selects every clip and renders once. Batched runs select and
//! render each batch into a run-scoped temporary directory, one batch at a
//! time, then concatenate the intermediates and attach audio and title.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use reel_media::{AudioTrack, MediaProbe, RenderOutput, RenderProgressFn, RenderRequest, Renderer, ScoreSource};
use reel_models::{ClipSelection, ExecutionMode, ExecutionPlan, MediaItem, MediaKind, ProgressPhase, SelectionSource};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn, Instrument};

use crate::config::PlannerConfig;
use crate::error::{PlannerError, PlannerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::pacing::{BeatCursor, PacingPlan};
use crate::progress::{
    ProgressCallback, ProgressRange, ProgressTracker, BATCHED_ASSEMBLY, BATCHED_SELECTION, SINGLE_PASS_ASSEMBLY,
    SINGLE_PASS_SELECTION,
};
use crate::selector::ClipSelector;

/// Share of each batch's progress slice spent selecting.
const BATCH_SELECTION_SHARE: f64 = 0.6;

/// Output settings for one run.
#[derive(Debug, Clone, Default)]
pub struct RenderJob {
    pub output: PathBuf,
    pub audio: Option<AudioTrack>,
    pub title: Option<String>,
}

impl RenderJob {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_audio(mut self, audio: AudioTrack) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Result of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub run_id: String,
    pub output: PathBuf,
    /// Output length in seconds
    pub duration: f64,
    pub clip_count: usize,
    /// 1 for single pass
    pub batch_count: usize,
    /// Items left out because the audio was already covered
    pub skipped: usize,
}

/// Selections held for the batch currently being processed.
///
/// Released after the batch renders, and on drop when the batch fails.
#[derive(Debug)]
pub struct ClipScope {
    batch: usize,
    selections: Vec<ClipSelection>,
    released: bool,
}

impl ClipScope {
    pub fn open(batch: usize) -> Self {
        debug!(batch, "Opening clip scope");
        Self {
            batch,
            selections: Vec::new(),
            released: false,
        }
    }

    pub fn push(&mut self, selection: ClipSelection) {
        self.selections.push(selection);
    }

    pub fn selections(&self) -> &[ClipSelection] {
        &self.selections
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Drop every held selection.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        debug!(batch = self.batch, clips = self.selections.len(), "Releasing clip scope");
        self.selections.clear();
        self.selections.shrink_to_fit();
        self.released = true;
    }
}

impl Drop for ClipScope {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs execution plans against a score source, probe and renderer.
#[derive(Clone)]
pub struct BatchScheduler {
    scores: Arc<dyn ScoreSource>,
    probe: Arc<dyn MediaProbe>,
    renderer: Arc<dyn Renderer>,
    config: PlannerConfig,
}

/// Per-run state shared by the selection loops.
struct RunContext<'a> {
    selector: ClipSelector,
    pacing: PacingPlan,
    cursor: BeatCursor,
    tracker: Arc<ProgressTracker>,
    total_items: usize,
    /// Global index of the next item
    next_index: usize,
    skipped: usize,
    logger: &'a RunLogger,
}

impl BatchScheduler {
    pub fn new(
        scores: Arc<dyn ScoreSource>,
        probe: Arc<dyn MediaProbe>,
        renderer: Arc<dyn Renderer>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            scores,
            probe,
            renderer,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Execute `plan`, writing the reel to `job.output`.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        job: &RenderJob,
        progress: ProgressCallback,
    ) -> PlannerResult<RenderSummary> {
        let logger = RunLogger::new(match plan.mode {
            ExecutionMode::SinglePass => "single_pass",
            ExecutionMode::Batched(_) => "batched",
        });
        let span = logger.create_span();

        async {
            logger.log_start(&format!(
                "{} items, {:.1}s audio, output {}",
                plan.items.len(),
                plan.audio_duration,
                job.output.display()
            ));

            let result = self.run(plan, job, progress, &logger).await;
            match &result {
                Ok(summary) => logger.log_completion(&format!(
                    "{} clips in {} batch(es), {:.2}s",
                    summary.clip_count, summary.batch_count, summary.duration
                )),
                Err(e) => logger.log_error(&e.to_string()),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        plan: &ExecutionPlan,
        job: &RenderJob,
        progress: ProgressCallback,
        logger: &RunLogger,
    ) -> PlannerResult<RenderSummary> {
        if plan.items.is_empty() {
            return Err(PlannerError::NoMedia);
        }

        let sampling = reel_media::SamplingOptions {
            max_frames: plan.max_frames,
            ..self.config.sampling()
        };
        let mut ctx = RunContext {
            selector: ClipSelector::new(Arc::clone(&self.scores), Arc::clone(&self.probe), sampling),
            pacing: PacingPlan::resolve(&plan.pacing, plan.audio_duration, plan.items.len(), plan.transition)?,
            cursor: BeatCursor::new(),
            tracker: ProgressTracker::new(progress),
            total_items: plan.items.len(),
            next_index: 0,
            skipped: 0,
            logger,
        };
        info!(
            strategy = plan.pacing.name(),
            target = ctx.pacing.target_duration(),
            "Pacing resolved"
        );

        match &plan.mode {
            ExecutionMode::SinglePass => self.run_single_pass(plan, job, &mut ctx).await,
            ExecutionMode::Batched(batches) => self.run_batched(plan, &batches.batches, job, &mut ctx).await,
        }
    }

    async fn run_single_pass(
        &self,
        plan: &ExecutionPlan,
        job: &RenderJob,
        ctx: &mut RunContext<'_>,
    ) -> PlannerResult<RenderSummary> {
        let mut scope = ClipScope::open(0);
        select_into(&mut scope, &plan.items, ctx, SINGLE_PASS_SELECTION).await;
        if scope.is_empty() {
            return Err(PlannerError::invalid_input("audio is too short for any clip"));
        }

        let request = RenderRequest {
            selections: scope.selections().to_vec(),
            audio: job.audio.clone(),
            output: job.output.clone(),
            transition: plan.transition,
            target_width: self.config.target_width,
            title: job.title.clone(),
            encoding: self.config.encoding.clone(),
        };
        let output = self
            .render_stage(&request, "single_pass", &ctx.tracker, SINGLE_PASS_ASSEMBLY, ProgressPhase::Assembling)
            .await?;
        scope.release();

        ctx.tracker.complete("Highlight reel complete");
        Ok(self.summary(ctx, output, 1))
    }

    async fn run_batched(
        &self,
        plan: &ExecutionPlan,
        batches: &[Vec<MediaItem>],
        job: &RenderJob,
        ctx: &mut RunContext<'_>,
    ) -> PlannerResult<RenderSummary> {
        let temp_dir = self.create_temp_dir().await?;
        let batch_count = batches.len();
        let mut intermediates: Vec<RenderOutput> = Vec::with_capacity(batch_count);

        for (index, batch) in batches.iter().enumerate() {
            let slice = BATCHED_SELECTION.slice(index, batch_count);
            let (select_range, render_range) = slice.split(BATCH_SELECTION_SHARE);
            ctx.tracker.report(
                select_range.at(0.0),
                ProgressPhase::Selecting,
                format!("Batch {}/{}: selecting clips", index + 1, batch_count),
            );

            let mut scope = ClipScope::open(index);
            select_into(&mut scope, batch, ctx, select_range).await;
            if scope.is_empty() {
                ctx.logger
                    .log_warning(&format!("Batch {} has no clips, audio already covered", index + 1));
                continue;
            }

            let request = RenderRequest {
                selections: scope.selections().to_vec(),
                audio: None,
                output: intermediate_path(temp_dir.path(), index),
                transition: plan.transition,
                target_width: self.config.target_width,
                title: None,
                encoding: self.config.encoding.intermediate(),
            };
            let output = self
                .render_stage(&request, "batch", &ctx.tracker, render_range, ProgressPhase::RenderingBatch)
                .await?;
            scope.release();
            metrics::record_batch_rendered();
            ctx.logger.log_progress(&format!(
                "Batch {}/{} rendered: {} clips, {:.2}s",
                index + 1,
                batch_count,
                output.clip_count,
                output.duration
            ));
            intermediates.push(output);
        }

        if intermediates.is_empty() {
            return Err(PlannerError::invalid_input("audio is too short for any clip"));
        }

        let clip_count = intermediates.iter().map(|o| o.clip_count).sum();
        let request = RenderRequest {
            selections: intermediates.iter().map(intermediate_selection).collect(),
            audio: job.audio.clone(),
            output: job.output.clone(),
            transition: 0.0,
            target_width: self.config.target_width,
            title: job.title.clone(),
            encoding: self.config.encoding.clone(),
        };
        let output = self
            .render_stage(&request, "concat", &ctx.tracker, BATCHED_ASSEMBLY, ProgressPhase::Assembling)
            .await?;

        if let Err(e) = temp_dir.close() {
            warn!(error = %e, "Failed to remove batch directory");
        }

        ctx.tracker.complete("Highlight reel complete");
        Ok(self.summary(
            ctx,
            RenderOutput {
                clip_count,
                ..output
            },
            intermediates.len(),
        ))
    }

    async fn render_stage(
        &self,
        request: &RenderRequest,
        stage: &'static str,
        tracker: &Arc<ProgressTracker>,
        range: ProgressRange,
        phase: ProgressPhase,
    ) -> PlannerResult<RenderOutput> {
        tracker.report(range.at(0.0), phase, format!("Rendering {} clips", request.selections.len()));

        let on_progress: RenderProgressFn = {
            let tracker = Arc::clone(tracker);
            let message = format!("Rendering {stage}");
            Arc::new(move |fraction| tracker.advance(range.at(fraction), phase, message.as_str()))
        };

        let started = Instant::now();
        let output = self
            .renderer
            .render(request, on_progress)
            .await
            .map_err(|e| PlannerError::render_failed(format!("{stage} render failed: {e}")))?;
        metrics::record_render(stage, started.elapsed());

        tracker.report(range.at(1.0), phase, format!("Rendered {}", output.path.display()));
        Ok(output)
    }

    async fn create_temp_dir(&self) -> PlannerResult<TempDir> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("reel-batches-");
            builder
        };
        let dir = match &self.config.work_dir {
            Some(parent) => {
                tokio::fs::create_dir_all(parent).await?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "Created batch directory");
        Ok(dir)
    }

    fn summary(&self, ctx: &RunContext<'_>, output: RenderOutput, batch_count: usize) -> RenderSummary {
        RenderSummary {
            run_id: ctx.logger.run_id().to_string(),
            output: output.path,
            duration: output.duration,
            clip_count: output.clip_count,
            batch_count,
            skipped: ctx.skipped,
        }
    }
}

/// Select clips for `items` into `scope`, reporting across `range`.
async fn select_into(scope: &mut ClipScope, items: &[MediaItem], ctx: &mut RunContext<'_>, range: ProgressRange) {
    for (offset, item) in items.iter().enumerate() {
        let is_last = ctx.next_index + 1 == ctx.total_items;
        ctx.next_index += 1;

        match ctx.selector.select_item(item, &ctx.pacing, &mut ctx.cursor, is_last).await {
            Some(selection) => scope.push(selection),
            None => {
                ctx.skipped += 1;
                metrics::record_skipped(1);
                info!(item = %item.file_name(), "Audio fully covered, skipping item");
            }
        }

        ctx.tracker.report(
            range.at((offset + 1) as f64 / items.len() as f64),
            ProgressPhase::Selecting,
            format!("Selected {}/{}: {}", ctx.next_index, ctx.total_items, item.file_name()),
        );
    }
}

fn intermediate_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("batch_{index:03}.mp4"))
}

/// Whole intermediate as one clip of the final concatenation.
fn intermediate_selection(output: &RenderOutput) -> ClipSelection {
    let item = MediaItem::new(output.path.clone(), MediaKind::Video, Utc::now()).with_duration(output.duration);
    ClipSelection::new(item, 0.0, output.duration, SelectionSource::FullSpan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(name: &str) -> ClipSelection {
        let item = MediaItem::new(name, MediaKind::Image, Utc::now());
        ClipSelection::new(item, 0.0, 2.0, SelectionSource::Image)
    }

    #[test]
    fn test_clip_scope_release() {
        let mut scope = ClipScope::open(3);
        scope.push(selection("a.jpg"));
        scope.push(selection("b.jpg"));
        assert_eq!(scope.len(), 2);
        assert!(!scope.is_released());

        scope.release();
        assert!(scope.is_empty());
        assert!(scope.is_released());

        scope.release();
        assert!(scope.is_released());
    }

    #[test]
    fn test_intermediate_naming() {
        let path = intermediate_path(Path::new("/tmp/run"), 7);
        assert_eq!(path, PathBuf::from("/tmp/run/batch_007.mp4"));
    }

    #[test]
    fn test_intermediate_selection_spans_output() {
        let output = RenderOutput {
            path: PathBuf::from("/tmp/run/batch_000.mp4"),
            duration: 12.5,
            clip_count: 3,
        };
        let selection = intermediate_selection(&output);
        assert_eq!(selection.start_time, 0.0);
        assert_eq!(selection.duration, 12.5);
        assert_eq!(selection.item.duration, Some(12.5));
        assert!(selection.item.is_video());
    }

    #[test]
    fn test_render_job_builder() {
        let job = RenderJob::new("out.mp4").with_title("Trip").with_audio(AudioTrack {
            path: PathBuf::from("song.mp3"),
            duration: 30.0,
        });
        assert_eq!(job.title.as_deref(), Some("Trip"));
        assert_eq!(job.audio.map(|a| a.duration), Some(30.0));
    }
}
