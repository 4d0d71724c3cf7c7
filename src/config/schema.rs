//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML, and every
//! section has defaults so a minimal file only names what differs.

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::presence::DetectorConfig;

/// Root configuration for the presence monitor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Device being watched.
    pub device: DeviceConfig,

    /// Probe cadence, debounce window and probe method.
    pub probe: ProbeConfig,

    /// Remote-call broker connection.
    pub broker: BrokerConfig,

    /// Commands issued on presence transitions.
    pub dispatch: DispatchConfig,

    /// Shutdown behaviour.
    pub lifecycle: LifecycleConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl MonitorConfig {
    /// Detector settings for the configured device.
    pub fn detector(&self) -> DetectorConfig {
        DetectorConfig {
            host: self.device.host.clone(),
            cadence: Duration::from_millis(self.probe.cadence_ms),
            window_size: self.probe.window_size,
            timeout: Duration::from_millis(self.probe.timeout_ms),
            retries: self.probe.retries,
            overlap_probes: self.probe.overlap,
        }
    }
}

/// Monitored device.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Display name used in logs.
    pub name: String,

    /// IP address or host name to probe.
    pub host: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "PS3".to_string(),
            host: "192.168.1.2".to_string(),
        }
    }
}

/// How liveness is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeMethod {
    /// One ICMP echo via the system ping binary.
    #[default]
    Ping,
    /// TCP connect to the given port.
    Tcp { port: u16 },
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Time between probes in milliseconds.
    pub cadence_ms: u64,

    /// Number of agreeing outcomes needed to confirm a transition.
    pub window_size: usize,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Extra attempts per cycle before reporting Down.
    pub retries: u32,

    /// Probe on every tick even while the previous probe is outstanding.
    pub overlap: bool,

    pub method: ProbeMethod,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 1000,
            window_size: 3,
            timeout_ms: 50,
            retries: 0,
            overlap: true,
            method: ProbeMethod::Ping,
        }
    }
}

/// Port of the HTTP request/reply gateway in front of the broker.
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

/// Broker connection settings, passed through to the transport.
///
/// `host`/`port` address the HTTP gateway that relays calls onto the broker's
/// queues, not the broker's own AMQP listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    /// Virtual namespace on the broker.
    pub vhost: String,
    /// Per-call timeout in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            login: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

/// Request fields sent for one transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub activity: Option<String>,
    pub location: Option<String>,
    pub device: Option<String>,
    pub command: Option<String>,
}

/// Transition → command mapping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Queue the requests are sent to.
    pub queue: String,

    /// Sent when the device turns on.
    pub on: ActivityConfig,

    /// Sent when the device turns off.
    pub off: ActivityConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue: "activitymanager".to_string(),
            on: ActivityConfig {
                activity: Some("USE THE PS3".to_string()),
                location: Some("LOUNGE".to_string()),
                ..ActivityConfig::default()
            },
            off: ActivityConfig {
                activity: Some("LOUNGE OFF".to_string()),
                location: Some("LOUNGE".to_string()),
                ..ActivityConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long shutdown waits for in-flight calls, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_timeout_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
