//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_decisions_total` (counter): decisions by `verdict` and `reason`
//! - `gate_resolution_failures_total` (counter): failed host name lookups
//! - `gate_allow_list_entries` (gauge): entries in the active allow-list
//! - `gate_rejected_entries` (gauge): tokens dropped from the active allow-list

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::access::Verdict;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_decision(verdict: &Verdict) {
    ::metrics::counter!(
        "gate_decisions_total",
        "verdict" => verdict.decision.as_str(),
        "reason" => verdict.reason.as_str()
    )
    .increment(1);
}

pub fn record_resolution_failure() {
    ::metrics::counter!("gate_resolution_failures_total").increment(1);
}

pub fn record_allow_list(entries: usize, rejected: usize) {
    ::metrics::gauge!("gate_allow_list_entries").set(entries as f64);
    ::metrics::gauge!("gate_rejected_entries").set(rejected as f64);
}
