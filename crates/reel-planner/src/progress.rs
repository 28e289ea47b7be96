//! Run-wide progress reporting.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use reel_models::{ProgressEvent, ProgressPhase};

/// Callback receiving progress events.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Callback that drops every event.
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_| {})
}

/// Percent range covered by one part of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    pub start: u8,
    pub end: u8,
}

impl ProgressRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Percent at `fraction` of the way through this range.
    pub fn at(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.start as f64 + (self.end as f64 - self.start as f64) * fraction
    }

    /// The `index`-th of `count` equal slices.
    pub fn slice(&self, index: usize, count: usize) -> Self {
        let count = count.max(1);
        let width = self.end as f64 - self.start as f64;
        let start = self.start as f64 + width * index as f64 / count as f64;
        let end = self.start as f64 + width * (index + 1) as f64 / count as f64;
        Self::new(start.round() as u8, end.round() as u8)
    }

    /// Split at `fraction` into two consecutive ranges.
    pub fn split(&self, fraction: f64) -> (Self, Self) {
        let mid = self.at(fraction).round() as u8;
        (Self::new(self.start, mid), Self::new(mid, self.end))
    }
}

/// Selection span of a single-pass run; rendering takes the rest.
pub const SINGLE_PASS_SELECTION: ProgressRange = ProgressRange::new(0, 80);
pub const SINGLE_PASS_ASSEMBLY: ProgressRange = ProgressRange::new(80, 100);
/// Per-batch selection and rendering span of a batched run; concatenation takes the rest.
pub const BATCHED_SELECTION: ProgressRange = ProgressRange::new(0, 70);
pub const BATCHED_ASSEMBLY: ProgressRange = ProgressRange::new(70, 100);

/// Emits phase-labelled percentages that never go backwards.
pub struct ProgressTracker {
    callback: ProgressCallback,
    last: AtomicU8,
}

impl ProgressTracker {
    pub fn new(callback: ProgressCallback) -> Arc<Self> {
        Arc::new(Self {
            callback,
            last: AtomicU8::new(0),
        })
    }

    /// Last percentage emitted.
    pub fn current(&self) -> u8 {
        self.last.load(Ordering::SeqCst)
    }

    /// Emit an event, clamped so the percentage never decreases.
    pub fn report(&self, percent: f64, phase: ProgressPhase, message: impl Into<String>) {
        let clamped = self.raise(percent);
        (self.callback)(ProgressEvent::new(clamped, phase, message));
    }

    /// Emit only when the percentage moves forward. For chatty sources.
    pub fn advance(&self, percent: f64, phase: ProgressPhase, message: impl Into<String>) {
        let target = to_percent(percent);
        let previous = self.last.fetch_max(target, Ordering::SeqCst);
        if target > previous {
            (self.callback)(ProgressEvent::new(target, phase, message));
        }
    }

    pub fn complete(&self, message: impl Into<String>) {
        self.report(100.0, ProgressPhase::Complete, message);
    }

    fn raise(&self, percent: f64) -> u8 {
        let target = to_percent(percent);
        let previous = self.last.fetch_max(target, Ordering::SeqCst);
        previous.max(target)
    }
}

fn to_percent(percent: f64) -> u8 {
    if percent.is_finite() {
        percent.clamp(0.0, 100.0).floor() as u8
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Arc::new(move |e| sink.lock().unwrap().push(e));
        (callback, events)
    }

    #[test]
    fn test_never_goes_backwards() {
        let (callback, events) = recording();
        let tracker = ProgressTracker::new(callback);
        tracker.report(40.0, ProgressPhase::Selecting, "a");
        tracker.report(20.0, ProgressPhase::Selecting, "b");
        tracker.report(85.5, ProgressPhase::Assembling, "c");
        tracker.complete("done");

        let percents: Vec<u8> = events.lock().unwrap().iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![40, 40, 85, 100]);
    }

    #[test]
    fn test_advance_suppresses_repeats() {
        let (callback, events) = recording();
        let tracker = ProgressTracker::new(callback);
        for p in [10.0, 10.2, 10.9, 11.0, 9.0, 12.0] {
            tracker.advance(p, ProgressPhase::Assembling, "render");
        }
        let percents: Vec<u8> = events.lock().unwrap().iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![10, 11, 12]);
    }

    #[test]
    fn test_range_math() {
        let range = ProgressRange::new(0, 70);
        assert_eq!(range.at(0.5), 35.0);
        assert_eq!(range.slice(0, 3), ProgressRange::new(0, 23));
        assert_eq!(range.slice(2, 3), ProgressRange::new(47, 70));
        let (select, render) = ProgressRange::new(20, 40).split(0.6);
        assert_eq!(select, ProgressRange::new(20, 32));
        assert_eq!(render, ProgressRange::new(32, 40));
        assert_eq!(range.at(f64::NAN), 0.0);
    }
}
