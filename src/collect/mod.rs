//! The metrics-sampling engine.
//!
//! Converts cumulative kernel counters from /proc pseudo-files into
//! normalized per-second utilization figures. Every derived rate is a
//! two-point numerical derivative over a counter that only moves forward
//! except for environmental resets; the guards here (minimum elapsed time,
//! reset detection, plausibility ceilings) exist because kernel counters are
//! untrusted input and the consumer cannot validate what we emit.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod net;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{MetricRecord, TIMESTAMP_FORMAT};
use cpu::CpuTimes;
use disk::DiskStats;
use memory::MemInfo;
use net::NetDevStats;

/// Disk throughput above this is treated as a spurious reading.
pub const DISK_CEILING_MBPS: f64 = 10_000.0;

/// Network throughput above this is treated as a spurious reading.
pub const NET_CEILING_MBPS: f64 = 1_000.0;

/// Floor for the rate denominator, guarding sub-millisecond ticks.
const MIN_ELAPSED: Duration = Duration::from_millis(1);

const BYTES_PER_MB: f64 = 1_048_576.0;

/// Fatal startup error: the CPU counter baseline could not be established.
///
/// Disk and network sources are allowed to be absent (device naming varies
/// across hosts), but without CPU counters no meaningful sample can ever be
/// produced.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("cannot establish cpu baseline: {0}")]
    Cpu(#[from] cpu::CpuError),
}

/// Counter sources and device selection for a [`Sampler`].
///
/// Paths are fields so tests can point the sampler at fixture files.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub stat_path: PathBuf,
    pub meminfo_path: PathBuf,
    pub diskstats_path: PathBuf,
    pub netdev_path: PathBuf,
    /// Disk device to sample; auto-detected when `None`.
    pub disk_device: Option<String>,
    /// Network interface to sample; auto-detected when `None`.
    pub interface: Option<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            stat_path: PathBuf::from("/proc/stat"),
            meminfo_path: PathBuf::from("/proc/meminfo"),
            diskstats_path: PathBuf::from("/proc/diskstats"),
            netdev_path: PathBuf::from("/proc/net/dev"),
            disk_device: None,
            interface: None,
        }
    }
}

/// Tracks one cumulative byte counter and derives an MB/s rate per tick.
#[derive(Debug, Clone)]
struct RateTracker {
    prev_bytes: u64,
    prev_at: Instant,
    ceiling_mbps: f64,
}

impl RateTracker {
    fn new(bytes: u64, at: Instant, ceiling_mbps: f64) -> Self {
        Self {
            prev_bytes: bytes,
            prev_at: at,
            ceiling_mbps,
        }
    }

    /// Advance to the current counter value and return the rate for the
    /// elapsed interval. The retained state always moves to the raw current
    /// value, even across a counter reset, so the next delta is measured
    /// from the genuine post-reset baseline.
    fn advance(&mut self, bytes: u64, at: Instant) -> f64 {
        let elapsed = at.saturating_duration_since(self.prev_at);
        let rate = rate_mbps(self.prev_bytes, bytes, elapsed, self.ceiling_mbps);
        self.prev_bytes = bytes;
        self.prev_at = at;
        rate
    }
}

/// Two-point throughput in MB/s with reset and plausibility guards.
///
/// - Elapsed time below 1 ms counts as exactly 1 ms.
/// - A counter that went backwards (device reset or wrap) yields 0.
/// - A rate above `ceiling_mbps` yields 0 (spurious reading, not an error).
fn rate_mbps(prev_bytes: u64, curr_bytes: u64, elapsed: Duration, ceiling_mbps: f64) -> f64 {
    if curr_bytes < prev_bytes {
        debug!(
            prev_bytes,
            curr_bytes, "counter reset detected, reporting 0 for this tick"
        );
        return 0.0;
    }

    let elapsed = elapsed.max(MIN_ELAPSED);
    let mbps = (curr_bytes - prev_bytes) as f64 / BYTES_PER_MB / elapsed.as_secs_f64();

    if mbps > ceiling_mbps {
        debug!(
            mbps,
            ceiling_mbps, "implausible throughput reading, clamping to 0"
        );
        return 0.0;
    }
    mbps
}

/// Produces one [`MetricRecord`] per invocation from the current raw OS
/// counters and its own retained previous state.
///
/// The sampler exclusively owns the previous-sample slot; it is mutated only
/// here, once per collection cycle. There is no history beyond this slot.
pub struct Sampler {
    config: SamplerConfig,
    disk_device: Option<String>,
    interface: Option<String>,
    prev_cpu: CpuTimes,
    disk: RateTracker,
    net: RateTracker,
}

impl Sampler {
    /// Perform one raw counter read per tracked resource and capture the
    /// time base. No record is emitted; there is no prior point to diff
    /// against yet.
    ///
    /// Fails only if the CPU counter source is unreadable or malformed.
    /// A missing disk device or network interface degrades to a
    /// zero-counter baseline.
    pub fn initialize(config: SamplerConfig) -> Result<Self, InitError> {
        let prev_cpu = CpuTimes::read_from(&config.stat_path)?;
        let now = Instant::now();

        let disk_device = config.disk_device.clone().or_else(|| {
            std::fs::read_to_string(&config.diskstats_path)
                .ok()
                .as_deref()
                .and_then(DiskStats::first_physical_device)
        });
        let disk_bytes = match &disk_device {
            Some(device) => match DiskStats::read_from(&config.diskstats_path, device) {
                Ok(stats) => stats.bytes_read(),
                Err(e) => {
                    warn!(error = %e, "disk baseline unavailable, starting from zero");
                    0
                }
            },
            None => {
                warn!("no disk device found, disk_io will read 0");
                0
            }
        };

        let interface = config.interface.clone().or_else(|| {
            std::fs::read_to_string(&config.netdev_path)
                .ok()
                .as_deref()
                .and_then(NetDevStats::first_physical_interface)
        });
        let net_bytes = match &interface {
            Some(iface) => match NetDevStats::read_from(&config.netdev_path, iface) {
                Ok(stats) => stats.rx_bytes,
                Err(e) => {
                    warn!(error = %e, "network baseline unavailable, starting from zero");
                    0
                }
            },
            None => {
                warn!("no network interface found, network_usage will read 0");
                0
            }
        };

        debug!(?disk_device, ?interface, "sampler initialized");

        Ok(Self {
            config,
            disk_device,
            interface,
            prev_cpu,
            disk: RateTracker::new(disk_bytes, now, DISK_CEILING_MBPS),
            net: RateTracker::new(net_bytes, now, NET_CEILING_MBPS),
        })
    }

    /// Run one collection cycle and return the composed record.
    ///
    /// Individual metric failures degrade to 0 for this tick and never
    /// abort collection of the remaining metrics.
    pub fn collect(&mut self) -> MetricRecord {
        let cpu_usage = match CpuTimes::read_from(&self.config.stat_path) {
            Ok(curr) => {
                let usage = curr.usage_since(&self.prev_cpu);
                self.prev_cpu = curr;
                usage
            }
            Err(e) => {
                warn!(error = %e, "cpu sample unavailable, reporting 0");
                0.0
            }
        };

        let memory_usage = match MemInfo::read_from(&self.config.meminfo_path) {
            Ok(mem) => mem.usage_pct(),
            Err(e) => {
                warn!(error = %e, "memory sample unavailable, reporting 0");
                0.0
            }
        };

        let disk_io = self.disk_rate();
        let network_usage = self.net_rate();

        MetricRecord {
            cpu_usage,
            memory_usage,
            disk_io,
            network_usage,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    fn disk_rate(&mut self) -> f64 {
        let Some(device) = &self.disk_device else {
            return 0.0;
        };
        match DiskStats::read_from(&self.config.diskstats_path, device) {
            Ok(stats) => self.disk.advance(stats.bytes_read(), Instant::now()),
            Err(e) => {
                warn!(error = %e, "disk sample unavailable, reporting 0");
                0.0
            }
        }
    }

    fn net_rate(&mut self) -> f64 {
        let Some(iface) = &self.interface else {
            return 0.0;
        };
        match NetDevStats::read_from(&self.config.netdev_path, iface) {
            Ok(stats) => self.net.advance(stats.rx_bytes, Instant::now()),
            Err(e) => {
                warn!(error = %e, "network sample unavailable, reporting 0");
                0.0
            }
        }
    }

    /// The disk device actually being sampled, if any.
    pub fn disk_device(&self) -> Option<&str> {
        self.disk_device.as_deref()
    }

    /// The network interface actually being sampled, if any.
    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }
}
