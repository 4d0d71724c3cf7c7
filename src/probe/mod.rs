//! Liveness probing.
//!
//! # Data Flow
//! ```text
//! Detector tick
//!     → probe_with_retries (up to retries + 1 attempts)
//!     → Prober impl:
//!         - command.rs (system ping, one echo request)
//!         - tcp.rs (TCP connect to a known port)
//!     → ProbeOutcome::Up / ProbeOutcome::Down
//! ```
//!
//! # Design Decisions
//! - Probes never fail: timeouts and errors collapse into `Down`
//! - Every probe is bounded by its own timeout
//! - Probers are shared via Arc across overlapping probe tasks

use std::time::Duration;
use futures_util::future::BoxFuture;

pub use crate::presence::window::ProbeOutcome;

pub mod command;
pub mod tcp;

pub use command::CommandProber;
pub use tcp::TcpProber;

/// A single liveness check against a host.
pub trait Prober: Send + Sync + 'static {
    /// Probe `host` once, giving up after `timeout`.
    fn probe<'a>(&'a self, host: &'a str, timeout: Duration) -> BoxFuture<'a, ProbeOutcome>;
}

/// Probe up to `retries + 1` times, stopping at the first `Up`.
pub async fn probe_with_retries<P>(
    prober: &P,
    host: &str,
    timeout: Duration,
    retries: u32,
) -> ProbeOutcome
where
    P: Prober + ?Sized,
{
    for attempt in 0..=retries {
        if prober.probe(host, timeout).await == ProbeOutcome::Up {
            return ProbeOutcome::Up;
        }
        if attempt < retries {
            tracing::trace!(host = %host, attempt = attempt + 1, "Probe failed, retrying");
        }
    }
    ProbeOutcome::Down
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers `Up` only on the n-th call.
    struct UpOnCall {
        calls: AtomicU32,
        up_on: u32,
    }

    impl Prober for UpOnCall {
        fn probe<'a>(&'a self, _host: &'a str, _timeout: Duration) -> BoxFuture<'a, ProbeOutcome> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let outcome = if call == self.up_on {
                ProbeOutcome::Up
            } else {
                ProbeOutcome::Down
            };
            async move { outcome }.boxed()
        }
    }

    #[tokio::test]
    async fn test_retries_until_up() {
        let prober = UpOnCall { calls: AtomicU32::new(0), up_on: 2 };
        let outcome = probe_with_retries(&prober, "host", Duration::from_millis(5), 2).await;
        assert_eq!(outcome, ProbeOutcome::Up);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_probes_once() {
        let prober = UpOnCall { calls: AtomicU32::new(0), up_on: 2 };
        let outcome = probe_with_retries(&prober, "host", Duration::from_millis(5), 0).await;
        assert_eq!(outcome, ProbeOutcome::Down);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }
}
