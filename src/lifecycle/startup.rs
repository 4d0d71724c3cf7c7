//! Startup orchestration.
//!
//! # Order
//! ```text
//! metrics → prober → transport + channel → dispatcher
//!     → detector (subscribe, start)
//!     → wait for SIGINT/SIGTERM
//!     → stop detector → drain channel → close channel
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Shutdown waits a bounded time for in-flight calls, then abandons them

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{MonitorConfig, ProbeMethod};
use crate::dispatch::Dispatcher;
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::presence::{DetectorError, PresenceDetector};
use crate::probe::{CommandProber, Prober, TcpProber};
use crate::rpc::{CallChannel, HttpTransport, Transport};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Detector(#[from] DetectorError),

    #[error("metrics: {0}")]
    Metrics(String),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

/// Prober for the configured method.
pub fn build_prober(method: &ProbeMethod) -> Arc<dyn Prober> {
    match method {
        ProbeMethod::Ping => Arc::new(CommandProber::new()),
        ProbeMethod::Tcp { port } => Arc::new(TcpProber::new(*port)),
    }
}

/// Run the monitor until SIGINT/SIGTERM.
pub async fn run(config: MonitorConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("invalid metrics address: {}", e)))?;
        metrics::init_metrics(addr).map_err(StartupError::Metrics)?;
    }

    let prober = build_prober(&config.probe.method);
    let transport = HttpTransport::new(config.broker.clone());

    run_with(config, prober, transport, async {
        let signal = signals::wait_for_signal().await?;
        tracing::info!(signal = %signal, "Shutdown signal received");
        Ok::<(), StartupError>(())
    })
    .await
}

/// Run with explicit collaborators until `until` resolves.
pub async fn run_with<P, T, F>(
    config: MonitorConfig,
    prober: Arc<P>,
    transport: T,
    until: F,
) -> Result<(), StartupError>
where
    P: Prober + ?Sized,
    T: Transport,
    F: Future<Output = Result<(), StartupError>>,
{
    tracing::info!(
        device = %config.device.name,
        host = %config.device.host,
        broker = %format!("{}:{}", config.broker.host, config.broker.port),
        queue = %config.dispatch.queue,
        "Initialising presence monitor"
    );

    let channel = CallChannel::new(transport);
    let dispatcher = Arc::new(Dispatcher::new(
        channel.clone(),
        config.device.name.clone(),
        config.dispatch.clone(),
    ));

    let detector = PresenceDetector::new(config.detector())?;
    dispatcher.attach(&detector);
    detector.start(prober)?;

    let stopped = until.await;

    tracing::info!("Exiting gracefully");
    detector.stop();

    let drain_timeout = Duration::from_millis(config.lifecycle.drain_timeout_ms);
    if !channel.drain(drain_timeout).await {
        tracing::warn!(
            in_flight = channel.in_flight(),
            "Abandoning calls still in flight"
        );
    }
    channel.close();

    tracing::info!("All done");
    stopped
}
