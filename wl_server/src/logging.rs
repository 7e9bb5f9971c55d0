//! Structured logging configuration.
//!
//! The ledger library logs through the `log` facade; those records are
//! bridged into the tracing subscriber installed here, so ledger, HTTP and
//! security events share one output with request correlation.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use wager_ledger::UserId;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var, falling back to
/// [`DEFAULT_FILTER`].
///
/// # Example
///
/// ```no_run
/// use wl_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Arguments
///
/// * `event_type` - Type of security event
/// * `user_id` - Optional user ID
/// * `message` - Event message
///
/// # Example
///
/// ```
/// use wl_server::logging::log_security_event;
///
/// log_security_event("invalid_token", None, "Signature verification failed");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<UserId>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Log a ledger operation that was refused
///
/// Client-side refusals (insufficient funds, blocked withdrawals) go out at
/// info level; storage failures at error level.
///
/// # Arguments
///
/// * `operation` - Ledger operation name
/// * `user_id` - Acting user
/// * `code` - Stable error code
/// * `server_fault` - Whether the failure is on our side
/// * `message` - Error description
pub fn log_ledger_rejection(
    operation: &str,
    user_id: UserId,
    code: &str,
    server_fault: bool,
    message: &str,
) {
    if server_fault {
        tracing::error!(
            operation = operation,
            user_id = user_id,
            code = code,
            "LEDGER: {}",
            message
        );
    } else {
        tracing::info!(
            operation = operation,
            user_id = user_id,
            code = code,
            "Ledger operation refused: {}",
            message
        );
    }
}

/// Log API request/response
///
/// # Arguments
///
/// * `request_id` - Correlation ID
/// * `method` - HTTP method
/// * `path` - Request path
/// * `status_code` - Response status code
/// * `duration_ms` - Request duration in milliseconds
pub fn log_api_request(
    request_id: &str,
    method: &str,
    path: &str,
    status_code: u16,
    duration_ms: u64,
) {
    if duration_ms > 1000 {
        tracing::warn!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "PERFORMANCE: Slow request"
        );
    } else {
        tracing::info!(
            request_id = request_id,
            http_method = method,
            http_path = path,
            http_status = status_code,
            duration_ms = duration_ms,
            "API request completed"
        );
    }
}
