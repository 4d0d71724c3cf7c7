//! Device presence monitor library.
//!
//! Probes one host on a fixed cadence, debounces the raw outcomes into a
//! confirmed on/off presence state, and issues a remote command through a
//! request/reply channel whenever that state changes.

pub mod config;
pub mod dispatch;
pub mod lifecycle;
pub mod observability;
pub mod presence;
pub mod probe;
pub mod rpc;

pub use config::MonitorConfig;
pub use dispatch::Dispatcher;
pub use presence::PresenceDetector;
pub use rpc::CallChannel;
