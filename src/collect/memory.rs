//! Physical memory usage from /proc/meminfo.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading memory statistics.
#[derive(Error, Debug)]
pub enum MemError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("missing field in meminfo: {0}")]
    MissingField(&'static str),
}

/// Total and free physical memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl MemInfo {
    /// Read memory statistics from a /proc/meminfo style file.
    pub fn read_from(path: &Path) -> Result<Self, MemError> {
        let content = std::fs::read_to_string(path).map_err(|source| MemError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse `MemTotal` and `MemFree` out of /proc/meminfo content.
    ///
    /// Format:
    /// ```text
    /// MemTotal:       16384000 kB
    /// MemFree:         8192000 kB
    /// ```
    pub fn parse(content: &str) -> Result<Self, MemError> {
        let mut total_bytes = None;
        let mut free_bytes = None;

        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_bytes = parse_kb_field(rest);
            } else if let Some(rest) = line.strip_prefix("MemFree:") {
                free_bytes = parse_kb_field(rest);
            }
            if total_bytes.is_some() && free_bytes.is_some() {
                break;
            }
        }

        Ok(Self {
            total_bytes: total_bytes.ok_or(MemError::MissingField("MemTotal"))?,
            free_bytes: free_bytes.ok_or(MemError::MissingField("MemFree"))?,
        })
    }

    /// Used-memory percentage: `100 * (1 - free/total)`, clamped to [0, 100].
    pub fn usage_pct(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let free_ratio = self.free_bytes as f64 / self.total_bytes as f64;
        (100.0 * (1.0 - free_ratio)).clamp(0.0, 100.0)
    }
}

/// Parse the numeric part of a meminfo value, converting kB to bytes.
fn parse_kb_field(rest: &str) -> Option<u64> {
    let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
    kb.checked_mul(1024)
}
