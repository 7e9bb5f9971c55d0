//! Prometheus metrics for monitoring ledger health and throughput.
//!
//! Metrics are exposed in Prometheus text format on a separate listener for
//! scraping by monitoring systems. Until [`init_metrics`] installs a recorder
//! every call here is a no-op.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts, duration, status codes
//! - **Ledger Metrics**: Operation outcomes, amounts, conflicts
//! - **Auth Metrics**: Rejected bearer tokens
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use wl_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/deposits", 201);
//! metrics::ledger_operation("deposit", "ok");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Count a ledger operation by outcome (`ok` or an error code).
pub fn ledger_operation(operation: &str, outcome: &str) {
    metrics::counter!("ledger_operations_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count a lost-update conflict that survived the in-process retries.
pub fn ledger_conflicts_total(operation: &str) {
    metrics::counter!("ledger_conflicts_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a committed amount in minor units.
pub fn ledger_amount(operation: &str, amount: i64) {
    metrics::histogram!("ledger_amount_minor_units",
        "operation" => operation.to_string()
    )
    .record(amount as f64);
}

/// Count a settled bet, split by whether it paid out.
pub fn bets_settled_total(hit: bool) {
    metrics::counter!("bets_settled_total",
        "hit" => hit.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment rejected bearer token counter.
pub fn auth_failures_total(reason: &str) {
    metrics::counter!("auth_failures_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}
