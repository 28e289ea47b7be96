//! Host memory introspection.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{MediaError, MediaResult};

/// Reports memory available to a new run, in bytes.
#[async_trait]
pub trait MemoryProbe: Send + Sync {
    async fn available_bytes(&self) -> MediaResult<u64>;
}

/// Parsed subset of `/proc/meminfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

impl MemInfo {
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.total.saturating_sub(self.available)) as f64 / self.total as f64 * 100.0
    }

    /// Parse meminfo text. Values are reported in kB.
    pub fn parse(content: &str) -> Option<Self> {
        let mut total = None;
        let mut available = None;
        let mut free = 0u64;
        let mut reclaimable = 0u64;

        for line in content.lines() {
            // Format: MemTotal:       16304248 kB
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(kb) = value.parse::<u64>() else {
                continue;
            };
            let bytes = kb * 1024;
            match key {
                "MemTotal:" => total = Some(bytes),
                "MemAvailable:" => available = Some(bytes),
                "MemFree:" => free = bytes,
                "Buffers:" | "Cached:" => reclaimable += bytes,
                _ => {}
            }
        }

        // Kernels before 3.14 lack MemAvailable
        let total = total?;
        Some(Self {
            total,
            available: available.unwrap_or(free + reclaimable).min(total),
        })
    }
}

/// [`MemoryProbe`] reading `/proc/meminfo`.
#[derive(Debug, Clone)]
pub struct SystemMemory {
    path: PathBuf,
}

impl Default for SystemMemory {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/proc/meminfo"),
        }
    }
}

impl SystemMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from an alternate meminfo file.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn snapshot(&self) -> MediaResult<MemInfo> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MediaError::MemoryUnavailable(format!("Could not read {}: {}", self.path.display(), e))
        })?;
        MemInfo::parse(&content).ok_or_else(|| {
            MediaError::MemoryUnavailable(format!("No MemTotal in {}", self.path.display()))
        })
    }
}

#[async_trait]
impl MemoryProbe for SystemMemory {
    async fn available_bytes(&self) -> MediaResult<u64> {
        Ok(self.snapshot().await?.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MEMINFO: &str = "MemTotal:       16384000 kB\n\
                           MemFree:         1024000 kB\n\
                           MemAvailable:    8192000 kB\n\
                           Buffers:          512000 kB\n\
                           Cached:          2048000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let info = MemInfo::parse(MEMINFO).unwrap();
        assert_eq!(info.total, 16_384_000 * 1024);
        assert_eq!(info.available, 8_192_000 * 1024);
        assert!((info.used_percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_without_memavailable() {
        let info = MemInfo::parse("MemTotal: 1000 kB\nMemFree: 100 kB\nCached: 200 kB\n").unwrap();
        assert_eq!(info.available, 300 * 1024);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(MemInfo::parse("nothing here").is_none());
    }

    #[tokio::test]
    async fn test_system_memory_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MEMINFO.as_bytes()).unwrap();
        let probe = SystemMemory::from_path(file.path());
        assert_eq!(probe.available_bytes().await.unwrap(), 8_192_000 * 1024);
        assert_eq!(probe.snapshot().await.unwrap().total, 16_384_000 * 1024);
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let probe = SystemMemory::from_path("/nonexistent/meminfo");
        let err = probe.available_bytes().await.unwrap_err();
        assert!(matches!(err, MediaError::MemoryUnavailable(_)));
    }
}
