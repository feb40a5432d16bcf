//! Network throughput from /proc/net/dev.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while reading network statistics.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("interface '{0}' not found in net/dev")]
    InterfaceNotFound(String),
}

/// Raw per-interface byte counters parsed from /proc/net/dev.
///
/// Both counters are cumulative since boot (or since the interface was
/// re-enumerated, which the sampler treats as a reset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetDevStats {
    /// Interface name (e.g. "eth0", "ens5").
    pub interface: String,
    /// Bytes received.
    pub rx_bytes: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
}

impl NetDevStats {
    /// Read the counters for `interface` from a /proc/net/dev style file.
    pub fn read_from(path: &Path, interface: &str) -> Result<Self, NetError> {
        let content = std::fs::read_to_string(path).map_err(|source| NetError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::find_interface(&content, interface)
            .ok_or_else(|| NetError::InterfaceNotFound(interface.to_string()))
    }

    /// Find the named interface in /proc/net/dev content.
    ///
    /// Format (after two header lines):
    /// ```text
    ///  eth0: rx_bytes rx_packets errs drop fifo frame compressed multicast tx_bytes ...
    /// ```
    pub fn find_interface(content: &str, interface: &str) -> Option<Self> {
        content.lines().skip(2).find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            if name.trim() != interface {
                return None;
            }
            let values: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|s| s.parse().ok())
                .collect();
            if values.len() < 9 {
                return None;
            }
            Some(Self {
                interface: interface.to_string(),
                rx_bytes: values[0],
                tx_bytes: values[8],
            })
        })
    }

    /// Pick the first physical interface from /proc/net/dev content.
    ///
    /// Loopback and common virtual interfaces (bridges, veth pairs, tunnels,
    /// WireGuard, Tailscale) are skipped.
    pub fn first_physical_interface(content: &str) -> Option<String> {
        for line in content.lines().skip(2) {
            let Some((name, _)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            if is_physical(name) {
                debug!(interface = %name, "selected network interface");
                return Some(name.to_string());
            }
        }
        None
    }
}

/// Whether an interface name refers to real hardware.
fn is_physical(name: &str) -> bool {
    if name == "lo" {
        return false;
    }

    const VIRTUAL_PREFIXES: &[&str] = &[
        "docker", "br-", "veth", "virbr", "vnet", "tun", "tap", "bond", "dummy", "wg",
        "tailscale", "utun",
    ];

    !VIRTUAL_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
