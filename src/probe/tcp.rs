//! TCP connect probe, for hosts that drop ICMP.

use std::io::ErrorKind;
use std::time::Duration;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::net::TcpStream;
use tokio::time;

use crate::probe::{ProbeOutcome, Prober};

/// Treats a completed or actively refused handshake as proof of life.
#[derive(Debug, Clone, Copy)]
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Prober for TcpProber {
    fn probe<'a>(&'a self, host: &'a str, timeout: Duration) -> BoxFuture<'a, ProbeOutcome> {
        async move {
            match time::timeout(timeout, TcpStream::connect((host, self.port))).await {
                Ok(Ok(_stream)) => ProbeOutcome::Up,
                // A RST means the host's stack answered
                Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => ProbeOutcome::Up,
                Ok(Err(e)) => {
                    tracing::trace!(host = %host, port = self.port, error = %e, "TCP probe failed");
                    ProbeOutcome::Down
                }
                Err(_) => {
                    tracing::trace!(host = %host, port = self.port, "TCP probe timed out");
                    ProbeOutcome::Down
                }
            }
        }
        .boxed()
    }
}
