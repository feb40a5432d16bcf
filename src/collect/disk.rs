//! Disk read throughput from /proc/diskstats.
//!
//! Sector counts are cumulative since boot; 1 sector = 512 bytes regardless
//! of the device's physical sector size.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Bytes per /proc/diskstats sector.
const SECTOR_BYTES: u64 = 512;

/// Errors that can occur while reading disk statistics.
#[derive(Error, Debug)]
pub enum DiskError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("device '{0}' not found in diskstats")]
    DeviceNotFound(String),
}

/// Raw per-device read counters parsed from /proc/diskstats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    /// Device name (e.g. "sda", "nvme0n1").
    pub device: String,
    /// Cumulative sectors read.
    pub sectors_read: u64,
}

impl DiskStats {
    /// Read the counters for `device` from a /proc/diskstats style file.
    pub fn read_from(path: &Path, device: &str) -> Result<Self, DiskError> {
        let content = std::fs::read_to_string(path).map_err(|source| DiskError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::find_device(&content, device)
            .ok_or_else(|| DiskError::DeviceNotFound(device.to_string()))
    }

    /// Find the named device in /proc/diskstats content.
    ///
    /// Format:
    /// ```text
    /// major minor name rd_ios rd_merges rd_sectors rd_ticks wr_ios ...
    /// ```
    pub fn find_device(content: &str, device: &str) -> Option<Self> {
        content.lines().find_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 || parts[2] != device {
                return None;
            }
            Some(Self {
                device: device.to_string(),
                sectors_read: parts[5].parse().unwrap_or(0),
            })
        })
    }

    /// Pick the first whole-disk device from /proc/diskstats content.
    ///
    /// Partitions (sda1, sdb2) and loop/ram devices are skipped; nvme
    /// namespaces (nvme0n1) are kept even though they end in a digit.
    pub fn first_physical_device(content: &str) -> Option<String> {
        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 6 {
                continue;
            }
            let name = parts[2];

            if name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram") {
                continue;
            }
            if is_partition(name) {
                continue;
            }

            debug!(device = %name, "selected disk device");
            return Some(name.to_string());
        }
        None
    }

    /// Cumulative bytes read.
    pub fn bytes_read(&self) -> u64 {
        self.sectors_read * SECTOR_BYTES
    }
}

/// Whether a device name looks like a partition rather than a whole disk.
///
/// Partition names end in a digit (sda1, vdb2); nvme and mmcblk device names
/// end in a digit themselves, so those only count as partitions when a
/// trailing `pN` suffix is present (nvme0n1p2, mmcblk0p1).
fn is_partition(name: &str) -> bool {
    let ends_in_digit = name.chars().last().is_some_and(|c| c.is_ascii_digit());
    if !ends_in_digit {
        return false;
    }
    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        match name.rfind('p') {
            Some(idx) => {
                let suffix = &name[idx + 1..];
                !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
            }
            None => false,
        }
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{Level, info};
    use tracing_subscriber::fmt;

    fn init_test_logging() {
        let _ = fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init();
    }

    const SAMPLE_DISKSTATS: &str = "\
   7       0 loop0 100 0 800 40 0 0 0 0 0 10 10 0 0 0 0
   8       0 sda 26054 5210 1538434 10982 14501 18837 1023010 28844 0 16292 39826 0 0 0 0
   8       1 sda1 25675 5105 1530266 10871 14388 18802 1023002 28771 0 16188 39642 0 0 0 0
 259       0 nvme0n1 50000 100 2000000 5000 30000 200 4000000 9000 0 8000 14000 0 0 0 0
";

    #[test]
    fn test_find_device() {
        init_test_logging();

        let stats = DiskStats::find_device(SAMPLE_DISKSTATS, "sda").expect("sda should be present");

        info!(
            device = %stats.device,
            sectors_read = stats.sectors_read,
            "RESULT: parsed sda stats"
        );

        assert_eq!(stats.device, "sda");
        assert_eq!(stats.sectors_read, 1_538_434);
        assert_eq!(stats.bytes_read(), 1_538_434 * 512);
    }

    #[test]
    fn test_find_device_missing() {
        init_test_logging();

        assert!(DiskStats::find_device(SAMPLE_DISKSTATS, "sdz").is_none());
    }

    #[test]
    fn test_first_physical_device_skips_loop_and_partitions() {
        init_test_logging();

        let device = DiskStats::first_physical_device(SAMPLE_DISKSTATS);

        info!(?device, "RESULT: auto-detected device");

        assert_eq!(device.as_deref(), Some("sda"));
    }

    #[test]
    fn test_first_physical_device_nvme() {
        init_test_logging();

        let content = "\
 259       0 nvme0n1 50000 100 2000000 5000 30000 200 4000000 9000 0 8000 14000 0 0 0 0
 259       1 nvme0n1p1 49000 90 1990000 4900 29000 190 3990000 8900 0 7900 13900 0 0 0 0
";
        assert_eq!(
            DiskStats::first_physical_device(content).as_deref(),
            Some("nvme0n1")
        );
    }

    #[test]
    fn test_first_physical_device_none() {
        init_test_logging();

        let content = "   7       0 loop0 100 0 800 40 0 0 0 0 0 10 10 0 0 0 0\n";
        assert!(DiskStats::first_physical_device(content).is_none());
    }
}
