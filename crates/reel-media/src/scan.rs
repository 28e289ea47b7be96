//! Media folder scanning.

use std::path::Path;

use chrono::{DateTime, Utc};
use reel_models::{MediaItem, MediaKind};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{MediaError, MediaResult};

/// Recursively collect videos and images under `dir`.
///
/// Items are ordered chronologically by modification time, oldest first,
/// with the path as tie-break so the order is stable.
pub fn scan_media(dir: impl AsRef<Path>) -> MediaResult<Vec<MediaItem>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(MediaError::FileNotFound(dir.to_path_buf()));
    }

    let mut items = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = MediaKind::from_path(path) else {
            continue;
        };

        let modified: DateTime<Utc> = entry
            .metadata()?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);

        debug!(path = %path.display(), kind = %kind, "Found media");
        items.push(MediaItem::new(path, kind, modified));
    }

    items.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));

    info!(
        dir = %dir.display(),
        videos = items.iter().filter(|i| i.is_video()).count(),
        images = items.iter().filter(|i| !i.is_video()).count(),
        "Scanned media folder"
    );

    Ok(items)
}
