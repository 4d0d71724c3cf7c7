//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MonitorConfig (validated, immutable)
//!     → split into detector / broker / dispatch settings at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    ActivityConfig, BrokerConfig, DeviceConfig, DispatchConfig, LifecycleConfig, MonitorConfig,
    ObservabilityConfig, ProbeConfig, ProbeMethod, DEFAULT_GATEWAY_PORT,
};
pub use validation::{validate_config, ValidationError};
