//! Wire format for delivering metric records to the consumer.
//!
//! One record per connection, serialized as a single comma-separated line:
//! `cpu_usage,memory_usage,disk_io,network_usage,timestamp`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Human-readable wall-clock format used in the wire timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised when parsing a wire line back into a record.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("expected 5 comma-separated fields, got {0}")]
    FieldCount(usize),

    #[error("invalid numeric field '{0}'")]
    Number(String),
}

/// One normalized utilization sample, as seen by the consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// CPU utilization percentage, [0, 100].
    pub cpu_usage: f64,
    /// Physical memory usage percentage, [0, 100].
    pub memory_usage: f64,
    /// Disk read throughput in MB/s.
    pub disk_io: f64,
    /// Network receive throughput in MB/s.
    pub network_usage: f64,
    /// Wall-clock timestamp, `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
}

impl MetricRecord {
    /// Serialize as the consumer-facing CSV line (no trailing newline).
    pub fn to_wire_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.cpu_usage, self.memory_usage, self.disk_io, self.network_usage, self.timestamp
        )
    }

    /// Parse a wire line back into a record.
    pub fn from_wire_line(line: &str) -> Result<Self, WireError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(',').collect();
        if fields.len() != 5 {
            return Err(WireError::FieldCount(fields.len()));
        }

        let number = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| WireError::Number(s.to_string()))
        };

        Ok(Self {
            cpu_usage: number(fields[0])?,
            memory_usage: number(fields[1])?,
            disk_io: number(fields[2])?,
            network_usage: number(fields[3])?,
            timestamp: fields[4].to_string(),
        })
    }
}
