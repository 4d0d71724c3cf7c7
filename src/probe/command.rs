//! ICMP echo via the system `ping` binary.

use std::process::Stdio;
use std::time::Duration;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::process::Command;
use tokio::time;

use crate::probe::{ProbeOutcome, Prober};

/// Runs `ping -n -c 1 -W <secs> <host>` and maps the exit status.
#[derive(Debug, Clone)]
pub struct CommandProber {
    program: String,
}

impl CommandProber {
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    /// Use a different ping-compatible executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, host: &str, timeout: Duration) -> Command {
        // iputils only takes whole seconds for -W; the tokio timeout is the real bound
        let wait_secs = timeout.as_secs().max(1);

        let mut cmd = Command::new(&self.program);
        cmd.arg("-n")
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(wait_secs.to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for CommandProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for CommandProber {
    fn probe<'a>(&'a self, host: &'a str, timeout: Duration) -> BoxFuture<'a, ProbeOutcome> {
        async move {
            let mut cmd = self.command(host, timeout);
            match time::timeout(timeout, cmd.status()).await {
                Ok(Ok(status)) if status.success() => ProbeOutcome::Up,
                Ok(Ok(status)) => {
                    tracing::trace!(host = %host, code = ?status.code(), "Ping reported host unreachable");
                    ProbeOutcome::Down
                }
                Ok(Err(e)) => {
                    tracing::debug!(host = %host, program = %self.program, error = %e, "Failed to run ping");
                    ProbeOutcome::Down
                }
                Err(_) => {
                    tracing::trace!(host = %host, "Ping timed out");
                    ProbeOutcome::Down
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_down() {
        let prober = CommandProber::with_program("definitely-not-a-ping-binary");
        let outcome = prober.probe("127.0.0.1", Duration::from_millis(200)).await;
        assert_eq!(outcome, ProbeOutcome::Down);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_outcome() {
        // `true`/`false` ignore their arguments, standing in for ping's exit code
        let up = CommandProber::with_program("true");
        assert_eq!(up.probe("host", Duration::from_secs(2)).await, ProbeOutcome::Up);

        let down = CommandProber::with_program("false");
        assert_eq!(down.probe("host", Duration::from_secs(2)).await, ProbeOutcome::Down);
    }
}
