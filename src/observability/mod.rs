//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Detector, channel and dispatcher produce:
//!     → logging.rs (structured, timestamped log events)
//!     → metrics.rs (probe counters, presence gauge, call counters)
//!
//! Consumers:
//!     → stdout (captured by the service manager)
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```

pub mod logging;
pub mod metrics;
