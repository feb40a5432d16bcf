//! sysmond: single-host resource telemetry sampler.
//!
//! Samples CPU, memory, disk I/O, and network throughput once per second
//! from /proc counters and serves the latest record to one TCP subscriber
//! per tick as a CSV line.
//!
//! ## Modules
//!
//! - [`collect`]: the sampling engine (delta computation, reset and
//!   plausibility guards)
//! - [`protocol`]: the consumer-facing record and wire format
//! - [`server`]: per-tick bounded TCP delivery
//! - [`pidfile`]: single-instance lock
//! - [`logging`]: tracing setup

#![forbid(unsafe_code)]

pub mod collect;
pub mod logging;
pub mod pidfile;
pub mod protocol;
pub mod server;

pub use collect::cpu::{CpuError, CpuTimes};
pub use collect::disk::{DiskError, DiskStats};
pub use collect::memory::{MemError, MemInfo};
pub use collect::net::{NetDevStats, NetError};
pub use collect::{DISK_CEILING_MBPS, InitError, NET_CEILING_MBPS, Sampler, SamplerConfig};
pub use logging::{LogConfig, LogFormat, init_logging};
pub use pidfile::{PidFile, PidInfo};
pub use protocol::{MetricRecord, TIMESTAMP_FORMAT, WireError};
pub use server::MetricServer;
