//! Presence detection subsystem.
//!
//! # Data Flow
//! ```text
//! Cadence timer (detector.rs)
//!     → spawn probe (crate::probe)
//!     → outcome arrives in completion order
//!     → window.rs (push, evict oldest, recompute state)
//!     → confirmed state changed? → PresenceChanged listeners
//! ```
//!
//! # Design Decisions
//! - Unanimity over the whole window suppresses flapping
//! - Unknown never becomes the confirmed state and never fires
//! - Listeners are an explicit subscribe/unsubscribe surface with a closed event enum

pub mod detector;
pub mod window;

pub use detector::{
    DetectorConfig, DetectorError, EventKind, PresenceDetector, SubscriptionId,
};
pub use window::{PresenceState, PresenceWindow, ProbeOutcome};
