//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → metrics → channel → dispatcher → detector start
//!
//! Shutdown (shutdown.rs):
//!     Stop signal → probe loop exits → late probe results dropped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop detector → drain calls → exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
