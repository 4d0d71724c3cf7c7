//! Device presence monitor.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────┐  Up/Down   ┌───────────────────┐  on/off   ┌────────────┐
//!   │  probe   │──────────▶│ presence detector │─────────▶│ dispatcher │
//!   │ ping/tcp │           │  debounce window  │          └─────┬──────┘
//!   └──────────┘           └───────────────────┘                │ request
//!        ▲ cadence timer                                        ▼
//!        │                                              ┌──────────────┐
//!   ┌────┴──────┐                                       │ call channel │──▶ broker
//!   │ lifecycle │ SIGINT/SIGTERM → stop, drain, close   │ in-flight #  │◀── reply
//!   └───────────┘                                       └──────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;

use presence_monitor::config::{self, MonitorConfig};
use presence_monitor::lifecycle::startup;
use presence_monitor::observability::logging;

#[derive(Parser)]
#[command(name = "presence-monitor")]
#[command(about = "Watches a device on the network and reacts when it turns on or off", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the monitored host.
    #[arg(long)]
    host: Option<String>,

    /// Override the log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(host) = cli.host {
        config.device.host = host;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level)?;

    tracing::info!("presence-monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        device = %config.device.name,
        host = %config.device.host,
        cadence_ms = config.probe.cadence_ms,
        window_size = config.probe.window_size,
        method = ?config.probe.method,
        "Configuration loaded"
    );

    startup::run(config).await?;
    Ok(())
}
