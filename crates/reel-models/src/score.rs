//! Time-ordered visual appeal scores for one media item.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ModelError, ModelResult};

/// One scored frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreSample {
    /// Seconds from the start of the media
    pub timestamp: f64,
    /// Visual appeal, typically in [0, 1]
    pub score: f64,
}

impl ScoreSample {
    pub fn new(timestamp: f64, score: f64) -> Self {
        Self { timestamp, score }
    }
}

/// Ordered score samples for a single media item.
///
/// Timestamps are non-decreasing; spacing may be irregular. An empty series
/// means scoring was unavailable for the item. Deserialization goes through
/// [`ScoreSeries::new`], so the ordering holds for series read from JSON too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct ScoreSeries {
    samples: Vec<ScoreSample>,
}

impl<'de> Deserialize<'de> for ScoreSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let samples = Vec::<ScoreSample>::deserialize(deserializer)?;
        Self::new(samples).map_err(serde::de::Error::custom)
    }
}

impl ScoreSeries {
    /// Build a series, validating timestamp order.
    pub fn new(samples: Vec<ScoreSample>) -> ModelResult<Self> {
        for (index, sample) in samples.iter().enumerate() {
            if !sample.timestamp.is_finite() || sample.timestamp < 0.0 {
                return Err(ModelError::NegativeTimestamp {
                    index,
                    timestamp: sample.timestamp,
                });
            }
            if index > 0 {
                let previous = samples[index - 1].timestamp;
                if sample.timestamp < previous {
                    return Err(ModelError::UnorderedSeries {
                        index,
                        previous,
                        current: sample.timestamp,
                    });
                }
            }
        }
        Ok(Self { samples })
    }

    /// Build a series from `(timestamp, score)` pairs.
    pub fn from_pairs<I>(pairs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(t, s)| ScoreSample::new(t, s))
                .collect(),
        )
    }

    /// Series with no samples (scoring unavailable).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[ScoreSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the last sample, 0 for an empty series.
    pub fn span(&self) -> f64 {
        self.samples.last().map(|s| s.timestamp).unwrap_or(0.0)
    }
}
