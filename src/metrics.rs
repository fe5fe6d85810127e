//! Prometheus metrics for IP whitelist decisions.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `ip_whitelist_decisions_total` - Decisions made (label: outcome = accepted | pass_through | denied)
//! - `ip_whitelist_evaluation_errors_total` - Custom evaluator failures
//!
//! ## Histograms
//! - `ip_whitelist_evaluation_duration_seconds` - Time spent in the policy evaluator
//!
//! Recording functions are no-ops until [`init_metrics`] installs an exporter,
//! so the engine can be used as a library without a metrics backend.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const DECISIONS_TOTAL: &str = "ip_whitelist_decisions_total";
    pub const EVALUATION_ERRORS_TOTAL: &str = "ip_whitelist_evaluation_errors_total";
    pub const EVALUATION_DURATION_SECONDS: &str = "ip_whitelist_evaluation_duration_seconds";
}

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns an error message if the exporter cannot be installed (e.g. the
/// port is taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DECISIONS_TOTAL,
        "Total number of IP whitelist decisions by outcome"
    );
    describe_counter!(
        names::EVALUATION_ERRORS_TOTAL,
        "Total number of failed policy evaluations"
    );
    describe_histogram!(
        names::EVALUATION_DURATION_SECONDS,
        "Policy evaluation duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_decision(outcome: &'static str) {
    counter!(names::DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_evaluation_error() {
    counter!(names::EVALUATION_ERRORS_TOTAL).increment(1);
}

pub fn record_evaluation_duration(duration_secs: f64) {
    histogram!(names::EVALUATION_DURATION_SECONDS).record(duration_secs);
}
