//! Debounce window and the presence state derived from it.
//!
//! # State Derivation
//! ```text
//! every outcome in window Up   → On
//! every outcome in window Down → Off
//! anything else                → Unknown
//! ```
//!
//! # Design Decisions
//! - The state is never stored, it is recomputed from the window on demand
//! - The window is seeded with a single `Down`, so a silent device reads Off

use std::collections::VecDeque;
use std::fmt;

/// Result of a single liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Up,
    Down,
}

impl ProbeOutcome {
    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Up => "up",
            ProbeOutcome::Down => "down",
        }
    }
}

/// Presence of the monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresenceState {
    On,
    Off,
    Unknown,
}

impl PresenceState {
    /// Status string published to subscribers ("on", "off", "unknown").
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceState::On => "on",
            PresenceState::Off => "off",
            PresenceState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-capacity FIFO of the most recent probe outcomes.
#[derive(Debug, Clone)]
pub struct PresenceWindow {
    capacity: usize,
    outcomes: VecDeque<ProbeOutcome>,
}

impl PresenceWindow {
    /// Create a window holding at most `capacity` outcomes, seeded with one `Down`.
    ///
    /// A zero capacity is clamped to 1; callers validate sizes beforehand.
    pub fn seeded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut outcomes = VecDeque::with_capacity(capacity);
        outcomes.push_back(ProbeOutcome::Down);
        Self { capacity, outcomes }
    }

    /// Append an outcome, evicting the oldest once at capacity.
    pub fn push(&mut self, outcome: ProbeOutcome) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(outcome);
    }

    /// Unanimity rule over the current contents.
    pub fn state(&self) -> PresenceState {
        if self.outcomes.iter().all(|o| *o == ProbeOutcome::Up) {
            PresenceState::On
        } else if self.outcomes.iter().all(|o| *o == ProbeOutcome::Down) {
            PresenceState::Off
        } else {
            PresenceState::Unknown
        }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Outcomes from oldest to newest.
    pub fn outcomes(&self) -> Vec<ProbeOutcome> {
        self.outcomes.iter().copied().collect()
    }
}
