//! CPU utilization from /proc/stat.
//!
//! The aggregate `cpu` line carries cumulative tick counts since boot.
//! Utilization is a two-point derivative over the non-idle share of the
//! elapsed ticks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading the CPU time counters.
#[derive(Error, Debug)]
pub enum CpuError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse cpu counters: invalid line '{0}'")]
    Parse(String),
}

/// Cumulative CPU time breakdown parsed from the first line of /proc/stat.
///
/// All fields are monotonically non-decreasing tick counts since boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Read the aggregate CPU counters from a /proc/stat style file.
    pub fn read_from(path: &Path) -> Result<Self, CpuError> {
        let content = std::fs::read_to_string(path).map_err(|source| CpuError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse the aggregate `cpu` line (the first line of /proc/stat).
    ///
    /// Format:
    /// ```text
    /// cpu  user nice system idle iowait irq softirq steal [guest guest_nice]
    /// ```
    ///
    /// The first 8 fields must parse as unsigned integers; trailing fields
    /// added by newer kernels are ignored.
    pub fn parse(content: &str) -> Result<Self, CpuError> {
        let line = content
            .lines()
            .next()
            .ok_or_else(|| CpuError::Parse(String::new()))?;

        let mut fields = line.split_whitespace();
        if fields.next() != Some("cpu") {
            return Err(CpuError::Parse(line.to_string()));
        }

        let values: Vec<u64> = fields
            .map_while(|s| s.parse::<u64>().ok())
            .collect();

        if values.len() < 8 {
            return Err(CpuError::Parse(line.to_string()));
        }

        Ok(Self {
            user: values[0],
            nice: values[1],
            system: values[2],
            idle: values[3],
            iowait: values[4],
            irq: values[5],
            softirq: values[6],
            steal: values[7],
        })
    }

    /// Sum of all tracked tick counters.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Ticks the CPU spent idle or waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// CPU utilization percentage over the interval [prev, self].
    ///
    /// A zero total delta (no tick progress, e.g. a stalled clock) yields 0.
    /// Counter inconsistencies saturate toward 0 rather than producing
    /// negative or out-of-range values.
    pub fn usage_since(&self, prev: &CpuTimes) -> f64 {
        let total_delta = self.total().saturating_sub(prev.total());
        if total_delta == 0 {
            return 0.0;
        }
        let idle_delta = self.idle_total().saturating_sub(prev.idle_total());
        let active_delta = total_delta.saturating_sub(idle_delta);
        100.0 * active_delta as f64 / total_delta as f64
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

    const SAMPLE_PROC_STAT: &str = "\
cpu  100 0 50 800 10 0 0 0 0 0
cpu0 50 0 25 400 5 0 0 0 0 0
cpu1 50 0 25 400 5 0 0 0 0 0
intr 12345678
ctxt 87654321
";

    #[test]
    fn test_parse_proc_stat() {
        init_test_logging();

        let times = CpuTimes::parse(SAMPLE_PROC_STAT).expect("parsing should succeed");

        info!(?times, "RESULT: parsed aggregate cpu line");

        assert_eq!(times.user, 100);
        assert_eq!(times.nice, 0);
        assert_eq!(times.system, 50);
        assert_eq!(times.idle, 800);
        assert_eq!(times.iowait, 10);
        assert_eq!(times.irq, 0);
        assert_eq!(times.softirq, 0);
        assert_eq!(times.steal, 0);
        assert_eq!(times.total(), 960);
        assert_eq!(times.idle_total(), 810);
    }

    #[test]
    fn test_parse_rejects_short_line() {
        init_test_logging();

        // Only 5 counters present
        let result = CpuTimes::parse("cpu  1 2 3 4 5\n");
        assert!(matches!(result, Err(CpuError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_non_cpu_line() {
        init_test_logging();

        let result = CpuTimes::parse("intr 1 2 3 4 5 6 7 8\n");
        assert!(matches!(result, Err(CpuError::Parse(_))));
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        init_test_logging();

        let result = CpuTimes::parse("");
        assert!(matches!(result, Err(CpuError::Parse(_))));
    }

    #[test]
    fn test_usage_concrete_scenario() {
        init_test_logging();

        let prev = CpuTimes {
            user: 100,
            nice: 0,
            system: 50,
            idle: 800,
            iowait: 10,
            irq: 0,
            softirq: 0,
            steal: 0,
        };
        let curr = CpuTimes {
            user: 120,
            nice: 0,
            system: 60,
            idle: 820,
            iowait: 10,
            irq: 0,
            softirq: 0,
            steal: 0,
        };

        // total delta = 1010 - 960 = 50, idle delta = 830 - 810 = 20
        let usage = curr.usage_since(&prev);

        info!(usage, "RESULT: cpu usage for concrete scenario");

        assert!((usage - 60.0).abs() < f64::EPSILON, "expected exactly 60.0");
    }

    #[test]
    fn test_usage_zero_total_delta() {
        init_test_logging();

        let times = CpuTimes::parse(SAMPLE_PROC_STAT).unwrap();
        let usage = times.usage_since(&times.clone());

        assert_eq!(usage, 0.0, "no tick progress must yield exactly 0");
    }

    #[test]
    fn test_usage_stays_in_range() {
        init_test_logging();

        let prev = CpuTimes {
            user: 0,
            nice: 0,
            system: 0,
            idle: 0,
            iowait: 0,
            irq: 0,
            softirq: 0,
            steal: 0,
        };

        // Fully busy interval
        let busy = CpuTimes {
            user: 500,
            nice: 0,
            system: 500,
            idle: 0,
            iowait: 0,
            irq: 0,
            softirq: 0,
            steal: 0,
        };
        assert_eq!(busy.usage_since(&prev), 100.0);

        // Fully idle interval
        let idle = CpuTimes {
            user: 0,
            nice: 0,
            system: 0,
            idle: 1000,
            iowait: 0,
            irq: 0,
            softirq: 0,
            steal: 0,
        };
        assert_eq!(idle.usage_since(&prev), 0.0);
    }

    #[test]
    fn test_usage_counter_regression_saturates() {
        init_test_logging();

        let prev = CpuTimes {
            user: 1000,
            nice: 0,
            system: 0,
            idle: 1000,
            iowait: 0,
            irq: 0,
            softirq: 0,
            steal: 0,
        };
        // Counters went backwards; saturating deltas must not panic or
        // produce values outside [0, 100].
        let curr = CpuTimes {
            user: 900,
            nice: 0,
            system: 0,
            idle: 1200,
            iowait: 0,
            irq: 0,
            softirq: 0,
            steal: 0,
        };

        let usage = curr.usage_since(&prev);
        info!(usage, "RESULT: usage after counter regression");
        assert!((0.0..=100.0).contains(&usage));
    }
}
