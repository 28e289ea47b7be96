//! Pacing strategies chosen at planning time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How clip durations are derived from the soundtrack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PacingStrategy {
    /// Equal clips whose crossfaded total matches the audio
    #[default]
    Uniform,
    /// Clips snapped to beat boundaries of the audio track
    BeatSync { beats: Vec<f64> },
}

impl PacingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PacingStrategy::Uniform => "uniform",
            PacingStrategy::BeatSync { .. } => "beat_sync",
        }
    }

    pub fn is_beat_sync(&self) -> bool {
        matches!(self, PacingStrategy::BeatSync { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let json = serde_json::to_value(PacingStrategy::BeatSync { beats: vec![0.5] }).unwrap();
        assert_eq!(json["strategy"], "beat_sync");
        assert_eq!(json["beats"][0], 0.5);

        let uniform: PacingStrategy = serde_json::from_str(r#"{"strategy":"uniform"}"#).unwrap();
        assert_eq!(uniform, PacingStrategy::Uniform);
        assert!(!uniform.is_beat_sync());
    }
}
