//! sysmond daemon entry point.
//!
//! The driver: a fixed one-second tick loop that runs one collection cycle,
//! offers the record to at most one subscriber, and shuts down cleanly when
//! signaled. Cleanup (pid file removal) happens in ordinary control flow
//! after the loop exits, never inside signal context.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::time;
use tracing::{debug, info, warn};

use sysmond::{LogConfig, MetricServer, PidFile, Sampler, SamplerConfig, init_logging};

/// Collection cadence; the sampling interval is fixed by design.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "sysmond", about = "Single-host resource telemetry sampler")]
struct Cli {
    /// Address to serve metric records on
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    listen: SocketAddr,

    /// Disk device to sample (defaults to the first physical disk)
    #[arg(long)]
    disk_device: Option<String>,

    /// Network interface to sample (defaults to the first physical interface)
    #[arg(long)]
    interface: Option<String>,

    /// Per-tick delivery budget in milliseconds
    #[arg(long, default_value_t = 500)]
    delivery_budget_ms: u64,

    /// Path to the pid lock file
    #[arg(long, default_value_os_t = default_pid_path())]
    pid_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn default_pid_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("sysmond.pid")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info");
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    init_logging(&log_config)?;

    info!(pid = std::process::id(), "starting sysmond");

    let pid_file = PidFile::acquire(&cli.pid_file)?;

    let config = SamplerConfig {
        disk_device: cli.disk_device,
        interface: cli.interface,
        ..SamplerConfig::default()
    };
    let mut sampler = Sampler::initialize(config)?;
    info!(
        disk_device = sampler.disk_device().unwrap_or("none"),
        interface = sampler.interface().unwrap_or("none"),
        "sampler ready"
    );

    let server = MetricServer::bind(cli.listen).await?;
    let budget = Duration::from_millis(cli.delivery_budget_ms);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut interval = time::interval(SAMPLE_INTERVAL);
    // The first tick fires immediately; skip it so every record spans a
    // full interval since initialization.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let record = sampler.collect();
                debug!(
                    cpu = record.cpu_usage,
                    memory = record.memory_usage,
                    disk = record.disk_io,
                    network = record.network_usage,
                    "collected sample"
                );
                if let Err(e) = server.deliver(&record, budget).await {
                    warn!(error = %e, "failed to deliver metric record");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    drop(pid_file);
    info!("sysmond stopped");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot install SIGTERM handler, handling SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
