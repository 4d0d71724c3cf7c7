//! Presence detector: probe loop plus debounce state machine.
//!
//! # Responsibilities
//! - Issue probes against one host on a fixed cadence
//! - Feed outcomes through the debounce window in completion order
//! - Publish `PresenceChanged` only on confirmed transitions
//!
//! # State Transitions
//! ```text
//! confirmed Off → On : window all Up
//! confirmed On → Off : window all Down
//! window mixed       : no change, no event
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::presence::window::{PresenceState, PresenceWindow, ProbeOutcome};
use crate::probe::{self, Prober};

pub const DEFAULT_WINDOW_SIZE: usize = 3;
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(50);

/// Errors raised when setting up a detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("detector is already running")]
    AlreadyRunning,
}

/// Event kinds a detector publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PresenceChanged,
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(PresenceState) + Send + Sync>;

/// Settings for a single monitored host.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub host: String,
    pub cadence: Duration,
    pub window_size: usize,
    pub timeout: Duration,
    pub retries: u32,
    /// Issue a probe on every tick even if the previous one is still running.
    pub overlap_probes: bool,
}

impl DetectorConfig {
    pub fn new(host: impl Into<String>, cadence: Duration) -> Self {
        Self {
            host: host.into(),
            cadence,
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_PROBE_TIMEOUT,
            retries: 0,
            overlap_probes: true,
        }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.host.trim().is_empty() {
            return Err(DetectorError::InvalidConfig("host is required".into()));
        }
        if self.cadence.is_zero() {
            return Err(DetectorError::InvalidConfig("cadence must be positive".into()));
        }
        if self.window_size == 0 {
            return Err(DetectorError::InvalidConfig("window size must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(DetectorError::InvalidConfig("probe timeout must be positive".into()));
        }
        Ok(())
    }
}

struct DetectorCore {
    window: PresenceWindow,
    confirmed: PresenceState,
    listeners: Vec<(SubscriptionId, EventKind, Handler)>,
    next_id: u64,
}

impl DetectorCore {
    fn new(window_size: usize) -> Self {
        Self {
            window: PresenceWindow::seeded(window_size),
            confirmed: PresenceState::Off,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    fn reseed(&mut self) {
        self.window = PresenceWindow::seeded(self.window.capacity());
        self.confirmed = PresenceState::Off;
    }
}

/// Core state plus the dispatch guard.
///
/// Handlers run under a read guard; `stop` takes the write guard, so once it
/// returns no handler is mid-flight and none can start.
struct DetectorShared {
    core: Mutex<DetectorCore>,
    dispatch: RwLock<()>,
}

struct RunningLoop {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

/// Debounced presence monitor for one host.
pub struct PresenceDetector {
    config: DetectorConfig,
    shared: Arc<DetectorShared>,
    running: Mutex<Option<RunningLoop>>,
}

impl PresenceDetector {
    /// Validate the configuration and build an idle detector (confirmed Off).
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        let core = DetectorCore::new(config.window_size);
        Ok(Self {
            config,
            shared: Arc::new(DetectorShared {
                core: Mutex::new(core),
                dispatch: RwLock::new(()),
            }),
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Register a handler for `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(PresenceState) + Send + Sync + 'static,
    {
        let mut core = lock(&self.shared.core);
        let id = SubscriptionId(core.next_id);
        core.next_id += 1;
        core.listeners.push((id, kind, Arc::new(handler)));
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut core = lock(&self.shared.core);
        let before = core.listeners.len();
        core.listeners.retain(|(sid, _, _)| *sid != id);
        core.listeners.len() != before
    }

    /// Feed one probe outcome. Returns the newly confirmed state if this caused a transition.
    ///
    /// Handlers run synchronously on the caller's thread. A handler that spawns
    /// tasks (such as an attached `Dispatcher`) needs a Tokio runtime; handlers
    /// must not call `stop` on this detector.
    pub fn on_probe_result(&self, outcome: ProbeOutcome) -> Option<PresenceState> {
        apply_outcome(&self.shared, &self.config.host, outcome)
    }

    /// Last confirmed state; never `Unknown`.
    pub fn confirmed_state(&self) -> PresenceState {
        lock(&self.shared.core).confirmed
    }

    /// Instantaneous state of the window, possibly `Unknown`.
    pub fn current_state(&self) -> PresenceState {
        lock(&self.shared.core).window.state()
    }

    /// Window contents, oldest first.
    pub fn window(&self) -> Vec<ProbeOutcome> {
        lock(&self.shared.core).window.outcomes()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.running).is_some()
    }

    /// Start probing on the configured cadence. Must be called inside a Tokio runtime.
    pub fn start<P>(&self, prober: Arc<P>) -> Result<(), DetectorError>
    where
        P: Prober + ?Sized,
    {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Err(DetectorError::AlreadyRunning);
        }

        lock(&self.shared.core).reseed();

        let shutdown = Shutdown::new();
        let stop = shutdown.subscribe();
        let task = tokio::spawn(probe_loop(
            self.shared.clone(),
            prober,
            self.config.clone(),
            stop,
        ));

        tracing::info!(
            host = %self.config.host,
            cadence_ms = self.config.cadence.as_millis() as u64,
            window_size = self.config.window_size,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Presence detector started"
        );

        *running = Some(RunningLoop { shutdown, task });
        Ok(())
    }

    /// Cancel the probe loop and detach every listener. Safe to call repeatedly.
    ///
    /// Blocks until handlers already running for a transition have returned;
    /// no `PresenceChanged` handler runs after this returns.
    pub fn stop(&self) {
        let stopped = lock(&self.running).take();
        {
            let _dispatch = self.shared.dispatch.write().unwrap_or_else(PoisonError::into_inner);
            lock(&self.shared.core).listeners.clear();
        }

        if let Some(running) = stopped {
            running.shutdown.trigger();
            // Results of probes already in flight are dropped with the loop's receiver
            drop(running.task);
            tracing::info!(host = %self.config.host, "Presence detector stopped");
        }
    }
}

impl Drop for PresenceDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_outcome(
    shared: &DetectorShared,
    host: &str,
    outcome: ProbeOutcome,
) -> Option<PresenceState> {
    metrics::record_probe(outcome);

    // Held until every handler has returned
    let _dispatch = shared.dispatch.read().unwrap_or_else(PoisonError::into_inner);

    let (state, handlers) = {
        let mut core = lock(&shared.core);
        core.window.push(outcome);
        let state = core.window.state();

        if state == PresenceState::Unknown || state == core.confirmed {
            return None;
        }

        core.confirmed = state;
        let handlers: Vec<Handler> = core
            .listeners
            .iter()
            .filter(|(_, kind, _)| *kind == EventKind::PresenceChanged)
            .map(|(_, _, handler)| handler.clone())
            .collect();
        (state, handlers)
    };

    tracing::info!(host = %host, state = %state, "Device presence changed");
    metrics::record_transition(state);

    // Core lock released: handlers may read the detector's state
    for handler in handlers {
        handler(state);
    }
    Some(state)
}

async fn probe_loop<P>(
    shared: Arc<DetectorShared>,
    prober: Arc<P>,
    config: DetectorConfig,
    mut stop: broadcast::Receiver<()>,
) where
    P: Prober + ?Sized,
{
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let mut ticker = time::interval(config.cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outstanding = 0usize;

    loop {
        tokio::select! {
            biased;

            _ = stop.recv() => {
                tracing::debug!(host = %config.host, outstanding, "Probe loop exiting");
                break;
            }
            Some(outcome) = result_rx.recv() => {
                outstanding = outstanding.saturating_sub(1);
                apply_outcome(&shared, &config.host, outcome);
            }
            _ = ticker.tick() => {
                if !config.overlap_probes && outstanding > 0 {
                    tracing::trace!(host = %config.host, "Previous probe outstanding, skipping tick");
                    continue;
                }
                outstanding += 1;

                let prober = prober.clone();
                let tx = result_tx.clone();
                let host = config.host.clone();
                let (timeout, retries) = (config.timeout, config.retries);
                tokio::spawn(async move {
                    let outcome = probe::probe_with_retries(&*prober, &host, timeout, retries).await;
                    // Receiver is gone once the detector stops
                    let _ = tx.send(outcome);
                });
            }
        }
    }
}
