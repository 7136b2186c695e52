//! Metrics collection and exposition.
//!
//! # Metrics
//! - `forwarder_connectivity` (gauge): 1=connected, 0=disconnected, by chain
//! - `forwarder_forward_attempts_total` (counter): by chain, outcome
//! - `forwarder_nonce_retries_total` (counter): failed pending-count queries
//! - `forwarder_confirmations_total` (counter): by outcome
//! - `forwarder_utxo_fee_sats` (gauge): fee applied to the last UTXO sweep
//! - `forwarder_status_polls_total` (counter): by outcome
//!
//! Every recorder is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape listener.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connectivity(chain: &'static str, connected: bool) {
    metrics::gauge!("forwarder_connectivity", "chain" => chain).set(if connected { 1.0 } else { 0.0 });
}

pub fn record_forward_attempt(chain: &'static str, outcome: &'static str) {
    metrics::counter!("forwarder_forward_attempts_total", "chain" => chain, "outcome" => outcome)
        .increment(1);
}

pub fn record_nonce_retry() {
    metrics::counter!("forwarder_nonce_retries_total").increment(1);
}

pub fn record_confirmation(outcome: &'static str) {
    metrics::counter!("forwarder_confirmations_total", "outcome" => outcome).increment(1);
}

pub fn record_utxo_fee(fee_sats: u64) {
    metrics::gauge!("forwarder_utxo_fee_sats").set(fee_sats as f64);
}

pub fn record_status_poll(outcome: &'static str) {
    metrics::counter!("forwarder_status_polls_total", "outcome" => outcome).increment(1);
}
