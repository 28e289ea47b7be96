//! Parsing of `ffmpeg -progress` key/value output.

use serde::{Deserialize, Serialize};

/// Encoder state accumulated from one `-progress` stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Seconds of output written
    pub out_time: f64,
    pub frame: u64,
    /// Realtime multiple; `None` until ffmpeg reports one
    pub speed: Option<f64>,
    /// Set by the final `progress=end` block
    pub done: bool,
}

impl FfmpegProgress {
    /// Share of `total_secs` written, in [0, 1]. Always 1 once done.
    pub fn fraction(&self, total_secs: f64) -> f64 {
        if self.done {
            1.0
        } else if total_secs > 0.0 {
            (self.out_time / total_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Wall-clock seconds left at the current speed.
    pub fn remaining_secs(&self, total_secs: f64) -> Option<f64> {
        let speed = self.speed.filter(|s| *s > 0.0)?;
        Some((total_secs - self.out_time).max(0.0) / speed)
    }

    /// Fold one line into the state.
    ///
    /// ffmpeg ends each block with `progress=continue` or `progress=end`; a
    /// snapshot is returned at that point and `None` otherwise.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key {
            // Both keys carry microseconds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time = us.max(0) as f64 / 1_000_000.0;
                }
            }
            "frame" => self.frame = value.parse().unwrap_or(self.frame),
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = Some(speed);
                }
            }
            "progress" => {
                self.done = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Whether a stderr line belongs to the `-progress` stream.
    pub fn is_progress_line(line: &str) -> bool {
        line.contains('=') && !line.contains(' ')
    }
}
