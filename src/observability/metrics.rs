//! Metrics collection and exposition.
//!
//! # Metrics
//! - `presence_probes_total` (counter): probe results by outcome
//! - `presence_state` (gauge): 1=on, 0=off
//! - `presence_transitions_total` (counter): confirmed transitions by new state
//! - `rpc_calls_in_flight` (gauge): calls awaiting `response_received`
//! - `rpc_calls_total` (counter): completed calls by outcome
//!
//! Without an installed recorder every call below is a no-op.

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::presence::window::{PresenceState, ProbeOutcome};

/// Install the Prometheus recorder and its HTTP listener. Needs a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_probe(outcome: ProbeOutcome) {
    metrics::counter!("presence_probes_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_transition(state: PresenceState) {
    metrics::counter!("presence_transitions_total", "state" => state.as_str()).increment(1);
    let value = match state {
        PresenceState::On => 1.0,
        _ => 0.0,
    };
    metrics::gauge!("presence_state").set(value);
}

pub fn record_in_flight(count: usize) {
    metrics::gauge!("rpc_calls_in_flight").set(count as f64);
}

pub fn record_call(outcome: &'static str) {
    metrics::counter!("rpc_calls_total", "outcome" => outcome).increment(1);
}
