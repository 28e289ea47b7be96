//! Media items discovered in the input folder.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Video container extensions picked up by the scanner.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Still image extensions picked up by the scanner.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Kind of media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Moving footage with a temporal window to search
    Video,
    /// Still photo shown for a fixed duration
    Image,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Image => "image",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single video or photo on disk.
///
/// Items are discovered once per run and never mutated afterwards; the
/// planner only reads the underlying file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaItem {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Video or image
    pub kind: MediaKind,
    /// File modification time, used for chronological ordering
    pub modified: DateTime<Utc>,
    /// Playable duration in seconds when already known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl MediaItem {
    /// Create an item with an explicit kind.
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind, modified: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            kind,
            modified,
            duration: None,
        }
    }

    /// Create an item, classifying its kind from the extension.
    pub fn from_path(path: impl Into<PathBuf>, modified: DateTime<Utc>) -> ModelResult<Self> {
        let path = path.into();
        let kind = MediaKind::from_path(&path)
            .ok_or_else(|| ModelError::UnsupportedMedia(path.display().to_string()))?;
        Ok(Self::new(path, kind, modified))
    }

    /// Attach a precomputed duration.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn is_video(&self) -> bool {
        self.kind.is_video()
    }

    /// File name for log lines and reports.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}
