//! Memory estimates and safety verdicts.

use std::fmt;
use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Estimated cost of loading one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ItemEstimate {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Predicted memory footprint for rendering a media set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MemoryEstimate {
    /// Per-item costs, in media order
    pub per_item: Vec<ItemEstimate>,
    /// Sum of per-item costs
    pub total_bytes: u64,
    /// Total plus assembly overhead and fixed base overhead
    pub peak_bytes: u64,
}

/// Outcome of comparing a peak estimate with available memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLevel {
    /// Comfortably within the safety margin
    Safe,
    /// Within available memory but above the safety margin
    Warning,
    /// Exceeds available memory
    Danger,
    /// Host memory could not be inspected
    Unknown,
}

impl MemoryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryLevel::Safe => "safe",
            MemoryLevel::Warning => "warning",
            MemoryLevel::Danger => "danger",
            MemoryLevel::Unknown => "unknown",
        }
    }

    /// Whether rendering in a single pass is acceptable.
    pub fn allows_single_pass(&self) -> bool {
        !matches!(self, MemoryLevel::Danger)
    }
}

impl fmt::Display for MemoryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory classification with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MemoryVerdict {
    pub level: MemoryLevel,
    pub estimated_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_bytes: Option<u64>,
    pub message: String,
}

impl MemoryVerdict {
    pub fn is_safe(&self) -> bool {
        self.level == MemoryLevel::Safe
    }
}
