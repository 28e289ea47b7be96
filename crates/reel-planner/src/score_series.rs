//! Windowed aggregation and best-window search over score series.
//!
//! Window bounds are located by binary search over the ordered timestamps and
//! the in-window slice is summed in sample order. The arithmetic is the same
//! as rescanning every sample per candidate, so ties break identically: the
//! earliest candidate with the strictly greatest average wins.

use reel_models::{ScoreSample, ScoreSeries};

/// Average reported for a window that contains no samples.
pub const NO_DATA_SCORE: f64 = 0.0;

/// Score reported when no window of the requested length fits the series.
pub const FULL_SERIES_SCORE: f64 = -1.0;

/// Result of [`best_window`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestWindow {
    /// Window start in seconds
    pub start: f64,
    /// Window average, or [`FULL_SERIES_SCORE`]
    pub score: f64,
    full_series: bool,
}

impl BestWindow {
    fn found(start: f64, score: f64) -> Self {
        Self {
            start,
            score,
            full_series: false,
        }
    }

    fn full_series() -> Self {
        Self {
            start: 0.0,
            score: FULL_SERIES_SCORE,
            full_series: true,
        }
    }

    /// No candidate fit; the caller should use the whole series.
    pub fn is_full_series(&self) -> bool {
        self.full_series
    }
}

/// Samples with timestamp in `[start, start + duration]`.
fn window_slice(samples: &[ScoreSample], start: f64, duration: f64) -> &[ScoreSample] {
    let end = start + duration;
    let lo = samples.partition_point(|s| s.timestamp < start);
    let hi = samples.partition_point(|s| s.timestamp <= end);
    if lo >= hi {
        &[]
    } else {
        &samples[lo..hi]
    }
}

/// Mean score of samples in the closed interval `[start, start + duration]`.
///
/// Returns [`NO_DATA_SCORE`] when no sample falls in range.
pub fn window_average(series: &ScoreSeries, start: f64, duration: f64) -> f64 {
    let window = window_slice(series.samples(), start, duration);
    if window.is_empty() {
        return NO_DATA_SCORE;
    }
    let sum: f64 = window.iter().map(|s| s.score).sum();
    sum / window.len() as f64
}

/// Highest-scoring window of length `duration`.
///
/// Every sample timestamp is a candidate start; candidates whose window would
/// run past the last sample are skipped.
pub fn best_window(series: &ScoreSeries, duration: f64) -> BestWindow {
    let samples = series.samples();
    let Some(last) = samples.last().map(|s| s.timestamp) else {
        return BestWindow::full_series();
    };

    let mut best: Option<BestWindow> = None;
    for sample in samples {
        let start = sample.timestamp;
        // Timestamps are ordered, so every later candidate overruns too
        if start + duration > last {
            break;
        }
        let score = window_average(series, start, duration);
        match best {
            Some(current) if score <= current.score => {}
            _ => best = Some(BestWindow::found(start, score)),
        }
    }

    best.unwrap_or_else(BestWindow::full_series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(f64, f64)]) -> ScoreSeries {
        ScoreSeries::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn naive_best(pairs: &[(f64, f64)], duration: f64) -> (f64, f64) {
        let last = pairs.last().map(|p| p.0).unwrap_or(0.0);
        let mut best = (0.0, FULL_SERIES_SCORE);
        let mut seen = false;
        for &(t, _) in pairs {
            if t + duration > last {
                break;
            }
            let in_window: Vec<f64> = pairs
                .iter()
                .filter(|(ts, _)| t <= *ts && *ts <= t + duration)
                .map(|p| p.1)
                .collect();
            let avg = in_window.iter().sum::<f64>() / in_window.len() as f64;
            if !seen || avg > best.1 {
                best = (t, avg);
                seen = true;
            }
        }
        best
    }

    #[test]
    fn test_constant_series_picks_earliest() {
        let s = series(&(0..30).map(|i| (i as f64, 0.7)).collect::<Vec<_>>());
        for duration in [1.0, 5.0, 12.5, 29.0] {
            let best = best_window(&s, duration);
            assert_eq!(best.start, 0.0, "duration {duration}");
            assert!(!best.is_full_series());
        }
    }

    #[test]
    fn test_short_series_returns_sentinel() {
        let s = series(&[(0.0, 0.9), (1.0, 0.8), (2.0, 0.7)]);
        let best = best_window(&s, 5.0);
        assert!(best.is_full_series());
        assert_eq!(best.start, 0.0);
        assert_eq!(best.score, FULL_SERIES_SCORE);
    }

    #[test]
    fn test_empty_series() {
        let s = ScoreSeries::empty();
        assert!(best_window(&s, 1.0).is_full_series());
        assert_eq!(window_average(&s, 0.0, 10.0), NO_DATA_SCORE);
    }

    #[test]
    fn test_window_average_no_samples_in_range() {
        let s = series(&[(0.0, 0.5), (10.0, 0.5)]);
        assert_eq!(window_average(&s, 2.0, 3.0), NO_DATA_SCORE);
        assert_eq!(window_average(&s, 20.0, 3.0), NO_DATA_SCORE);
    }

    #[test]
    fn test_window_average_closed_interval() {
        let s = series(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.5), (3.0, 0.0)]);
        assert!((window_average(&s, 1.0, 1.0) - 0.75).abs() < 1e-12);
        assert!((window_average(&s, 0.0, 3.0) - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_finds_peak() {
        let s = series(&[(0.0, 0.1), (1.0, 0.2), (2.0, 0.9), (3.0, 0.95), (4.0, 0.1), (5.0, 0.1)]);
        let best = best_window(&s, 1.0);
        assert_eq!(best.start, 2.0);
        assert!((best.score - 0.925).abs() < 1e-12);
    }

    #[test]
    fn test_exact_fit_is_valid() {
        let s = series(&[(0.0, 0.4), (2.0, 0.6)]);
        let best = best_window(&s, 2.0);
        assert!(!best.is_full_series());
        assert!((best.score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_negative_scores_still_select() {
        let s = series(&[(0.0, -3.0), (1.0, -2.0), (2.0, -2.0)]);
        let best = best_window(&s, 1.0);
        assert!(!best.is_full_series());
        assert_eq!(best.start, 1.0);
    }

    #[test]
    fn test_matches_naive_scan() {
        let pairs: Vec<(f64, f64)> = (0..80)
            .map(|i| {
                let t = i as f64 * 0.7 + if i % 3 == 0 { 0.0 } else { 0.2 };
                let s = ((i * 37) % 11) as f64 / 10.0;
                (t, s)
            })
            .collect();
        let s = series(&pairs);
        for duration in [0.5, 1.0, 3.3, 10.4, 40.0, 60.0] {
            let best = best_window(&s, duration);
            let (start, score) = naive_best(&pairs, duration);
            assert_eq!(best.start, start, "duration {duration}");
            assert_eq!(best.score, score, "duration {duration}");
        }
    }
}
