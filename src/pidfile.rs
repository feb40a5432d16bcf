//! Single-instance guard backed by a PID lock file.
//!
//! The file is created exclusively and holds the owning process id plus
//! enough context to debug a stale lock. It is removed when the guard is
//! dropped, in ordinary control flow after the driver loop exits.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lock file contents, for debugging stale locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidInfo {
    /// Process ID of the lock holder.
    pub pid: u32,
    /// Hostname where the lock was acquired.
    pub hostname: String,
    /// ISO 8601 timestamp when the lock was acquired.
    pub started_at: String,
}

/// A held PID lock. Dropping it removes the file.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create the lock file exclusively, replacing a stale one left behind
    /// by a dead process. Fails if another live instance holds the lock.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create pid file directory {:?}", parent))?;
        }

        if path.exists() && Self::is_stale(&path) {
            warn!(path = ?path, "removing stale pid file");
            let _ = fs::remove_file(&path);
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let info = PidInfo {
                    pid: std::process::id(),
                    hostname: hostname(),
                    started_at: chrono::Utc::now().to_rfc3339(),
                };
                serde_json::to_writer(&mut file, &info)
                    .with_context(|| format!("failed to write pid file {:?}", path))?;
                file.sync_all()
                    .with_context(|| format!("failed to sync pid file {:?}", path))?;

                debug!(path = ?path, pid = info.pid, "acquired pid file");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = Self::read_info(&path).ok();
                Err(anyhow!(
                    "another instance is already running (lock {:?}, holder {:?})",
                    path,
                    holder
                ))
            }
            Err(e) => {
                Err(anyhow::Error::from(e).context(format!("failed to create pid file {:?}", path)))
            }
        }
    }

    /// A lock is stale when its contents are unreadable or the recorded
    /// holder process is no longer alive.
    fn is_stale(path: &Path) -> bool {
        let info = match Self::read_info(path) {
            Ok(info) => info,
            Err(_) => return true,
        };

        #[cfg(target_os = "linux")]
        {
            !Path::new(&format!("/proc/{}", info.pid)).exists()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = info;
            false
        }
    }

    fn read_info(path: &Path) -> Result<PidInfo> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read pid file {:?}", path))?;
        serde_json::from_str(&content).context("failed to parse pid file contents")
    }

    /// Info about the current lock holder, if any.
    pub fn holder(path: &Path) -> Option<PidInfo> {
        path.exists().then(|| Self::read_info(path).ok()).flatten()
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = ?self.path, error = %e, "failed to remove pid file");
        } else {
            debug!(path = ?self.path, "released pid file");
        }
    }
}

/// Get the hostname, with fallback.
fn hostname() -> String {
    std::process::Command::new("hostname")
        .output()
        .ok()
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
