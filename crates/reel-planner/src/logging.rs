//! Structured run logging.
//!
//! Every line emitted for a run carries `run_id`, `mode` and the milliseconds
//! elapsed since the run began, so one reel can be followed through
//! interleaved output.

use std::fmt::Display;
use std::time::Instant;

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Logger bound to one scheduler run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    mode: &'static str,
    started: Instant,
}

impl RunLogger {
    /// Logger with a fresh v4 run id. `mode` is `"single_pass"` or `"batched"`.
    pub fn new(mode: &'static str) -> Self {
        Self::with_run_id(Uuid::new_v4(), mode)
    }

    pub fn with_run_id(run_id: Uuid, mode: &'static str) -> Self {
        Self {
            run_id: run_id.to_string(),
            mode,
            started: Instant::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn mode(&self) -> &'static str {
        self.mode
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    pub fn log_start(&self, detail: impl Display) {
        info!(run_id = %self.run_id, mode = self.mode, "Run started: {}", detail);
    }

    pub fn log_progress(&self, detail: impl Display) {
        info!(
            run_id = %self.run_id,
            mode = self.mode,
            elapsed_ms = self.elapsed_ms() as u64,
            "{}", detail
        );
    }

    pub fn log_warning(&self, detail: impl Display) {
        warn!(
            run_id = %self.run_id,
            mode = self.mode,
            elapsed_ms = self.elapsed_ms() as u64,
            "{}", detail
        );
    }

    pub fn log_error(&self, detail: impl Display) {
        error!(
            run_id = %self.run_id,
            mode = self.mode,
            elapsed_ms = self.elapsed_ms() as u64,
            "Run failed: {}", detail
        );
    }

    pub fn log_completion(&self, detail: impl Display) {
        info!(
            run_id = %self.run_id,
            mode = self.mode,
            elapsed_ms = self.elapsed_ms() as u64,
            "Run finished: {}", detail
        );
    }

    /// Span wrapping all work for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("reel_run", run_id = %self.run_id, mode = self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_run_id_is_uuid() {
        let logger = RunLogger::new("batched");
        assert!(Uuid::parse_str(logger.run_id()).is_ok());
        assert_eq!(logger.mode(), "batched");
    }

    #[test]
    fn test_explicit_run_id() {
        let id = Uuid::new_v4();
        let logger = RunLogger::with_run_id(id, "single_pass");
        assert_eq!(logger.run_id(), id.to_string());
    }

    #[test]
    fn test_fresh_ids_differ() {
        assert_ne!(RunLogger::new("batched").run_id(), RunLogger::new("batched").run_id());
    }
}
