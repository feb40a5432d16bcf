//! Structured logging initialization.
//!
//! Console logging via `tracing`, configured from environment variables so
//! the daemon can run under supervisors without CLI changes.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-friendly, pretty-printed logs.
    Pretty,
    /// JSON-formatted logs for machine parsing.
    Json,
    /// Compact single-line logs.
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Configuration for logging initialization.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Write console logs to stderr instead of stdout.
    pub use_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            use_stderr: false,
        }
    }
}

impl LogConfig {
    /// Build a logging configuration from environment variables.
    ///
    /// Supported variables:
    /// - SYSMOND_LOG_LEVEL
    /// - SYSMOND_LOG_FORMAT (pretty|json|compact)
    pub fn from_env(default_level: &str) -> Self {
        let mut config = Self {
            level: std::env::var("SYSMOND_LOG_LEVEL").unwrap_or_else(|_| default_level.to_string()),
            ..Self::default()
        };

        if let Ok(format) = std::env::var("SYSMOND_LOG_FORMAT") {
            if let Some(parsed) = LogFormat::parse(&format) {
                config.format = parsed;
            }
        }

        config
    }

    /// Override the base log level.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Write console logs to stderr.
    pub fn with_stderr(mut self) -> Self {
        self.use_stderr = true;
        self
    }

    /// Build the effective EnvFilter, honoring RUST_LOG if set.
    fn env_filter(&self) -> EnvFilter {
        if std::env::var_os("RUST_LOG").is_some() {
            if let Ok(filter) = EnvFilter::try_from_default_env() {
                return filter;
            }
        }
        EnvFilter::new(&self.level)
    }
}

/// Initialize tracing-based logging for the current process.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let writer = if config.use_stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let builder = fmt()
        .with_env_filter(config.env_filter())
        .with_writer(writer);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };

    result.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" compact "), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("fancy"), None);
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Compact);
        assert!(!config.use_stderr);
    }

    #[test]
    fn test_builder_overrides() {
        let config = LogConfig::default().with_level("debug").with_stderr();
        assert_eq!(config.level, "debug");
        assert!(config.use_stderr);
    }
}
