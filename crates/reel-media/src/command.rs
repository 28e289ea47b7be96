//! Multi-input ffmpeg invocations.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Non-progress stderr lines attached to failures.
const STDERR_TAIL_LINES: usize = 20;

/// ffmpeg `-v` level; warnings would bury the failure tail.
const LOG_LEVEL: &str = "error";

#[derive(Debug, Clone)]
struct Input {
    /// Options placed before this input's `-i`
    options: Vec<String>,
    path: PathBuf,
}

/// Argument list for one ffmpeg run: global flags, inputs, output options, output.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output_options: Vec<String>,
    output: PathBuf,
}

impl FfmpegCommand {
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output_options: Vec::new(),
            output: output.as_ref().to_path_buf(),
        }
    }

    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with(path, std::iter::empty::<String>())
    }

    /// Input preceded by its own options such as `-ss`, `-t` or `-loop`.
    pub fn input_with<I, S>(mut self, path: impl AsRef<Path>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            options: options.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    pub fn output_arg(self, arg: impl Into<String>) -> Self {
        self.output_args([arg])
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_options.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn filter_complex(self, graph: impl Into<String>) -> Self {
        self.output_args(["-filter_complex".to_string(), graph.into()])
    }

    /// Route an input stream (`2:a:0`) or graph label (`[vout]`) to the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_args(["-map".to_string(), stream.into()])
    }

    /// Cut the output at `seconds`.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_args(["-t".to_string(), format_secs(seconds)])
    }

    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Full argument list. Progress goes to stderr as `key=value` lines.
    pub fn build_args(&self) -> Vec<String> {
        let global = ["-y", "-hide_banner", "-v", LOG_LEVEL, "-progress", "pipe:2"];
        let inputs = self.inputs.iter().flat_map(|input| {
            input
                .options
                .iter()
                .cloned()
                .chain(["-i".to_string(), input.path.to_string_lossy().into_owned()])
        });

        global
            .into_iter()
            .map(String::from)
            .chain(inputs)
            .chain(self.output_options.iter().cloned())
            .chain(std::iter::once(self.output.to_string_lossy().into_owned()))
            .collect()
    }
}

/// Seconds with millisecond precision, as ffmpeg time options take them.
pub fn format_secs(seconds: f64) -> String {
    format!("{seconds:.3}")
}

/// Spawns ffmpeg and follows its progress.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill ffmpeg when it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `cmd`, calling `on_progress` at the end of every progress block.
    ///
    /// On failure the error carries the last non-progress stderr lines.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, on_progress: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send,
    {
        check_ffmpeg()?;
        let args = cmd.build_args();
        debug!(inputs = cmd.input_count(), "ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr was not piped"))?;

        let (status, tail) = tokio::join!(wait_with_timeout(&mut child, self.timeout), drain_stderr(stderr, on_progress));
        let status = status?;
        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            format!("ffmpeg failed writing {}", cmd.output_path().display()),
            (!tail.is_empty()).then_some(tail),
            status.code(),
        ))
    }
}

async fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> MediaResult<ExitStatus> {
    let Some(limit) = timeout else {
        return Ok(child.wait().await?);
    };
    match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => Ok(status?),
        Err(_) => {
            warn!(timeout_secs = limit.as_secs(), "ffmpeg timed out, killing");
            child.kill().await.ok();
            Err(MediaError::ffmpeg_failed(
                format!("ffmpeg timed out after {}s", limit.as_secs()),
                None,
                None,
            ))
        }
    }
}

/// Feed progress lines to `on_progress`; return the tail of everything else.
async fn drain_stderr<R, F>(stderr: R, on_progress: F) -> String
where
    R: AsyncRead + Unpin,
    F: Fn(FfmpegProgress),
{
    let mut lines = BufReader::new(stderr).lines();
    let mut state = FfmpegProgress::default();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = lines.next_line().await {
        if FfmpegProgress::is_progress_line(&line) {
            if let Some(snapshot) = state.apply_line(&line) {
                on_progress(snapshot);
            }
        } else {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
    Vec::from(tail).join("\n")
}

/// Path of the ffmpeg binary on `PATH`.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Path of the ffprobe binary on `PATH`.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
