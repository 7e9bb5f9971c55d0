//! HTTP API for the wager ledger.
//!
//! # Modules
//!
//! - [`accounts`]: Profile, balance, deposits, withdrawals, journal, reconciliation
//! - [`sessions`]: Game sessions and bets
//! - [`operators`]: Operators and their rollups
//! - [`middleware`]: Bearer authentication for protected endpoints
//! - [`request_id`]: Request correlation, request logs and HTTP metrics
//! - [`error`]: Error to status mapping
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                                  - Health check (public)
//! GET  /api/v1/user/me                          - Profile and balance
//! PUT  /api/v1/user/me                          - Update display name
//! GET  /api/v1/balance                          - Current balance
//! POST /api/v1/deposits                         - Deposit or bonus grant (cashier)
//! POST /api/v1/withdrawals                      - Withdraw real balance
//! GET  /api/v1/transactions?limit=N             - Merged journal, newest first
//! GET  /api/v1/reconciliation                   - Replay journal against balance
//! POST /api/v1/sessions                         - Start a game session
//! GET  /api/v1/sessions/{session_id}            - Session state
//! POST /api/v1/sessions/{session_id}/bets       - Place a bet
//! POST /api/v1/sessions/{session_id}/close      - Close a session
//! POST /api/v1/operators                        - Create an operator (operator admin)
//! GET  /api/v1/operators/{operator_id}          - Operator record
//! GET  /api/v1/operators/{operator_id}/totals   - Operator rollup
//! ```
//!
//! Every `/api/v1` route requires `Authorization: Bearer <token>`. Roles
//! marked in parentheses come from the token's `app_metadata.roles`.
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod accounts;
pub mod error;
pub mod middleware;
pub mod operators;
pub mod request_id;
pub mod sessions;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use wager_ledger::{
    Ledger, LedgerError, LedgerResult, UserId, db::LedgerStore, identity::TokenVerifier,
    session::OperatorAggregator,
};

use crate::{logging, metrics};

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request; every field is a cheap handle.
///
/// # Fields
///
/// - `ledger`: Balance, session and journal operations
/// - `aggregator`: Cached operator rollups
/// - `verifier`: Bearer token verification
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub aggregator: OperatorAggregator,
    pub verifier: Arc<TokenVerifier>,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use wl_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let v1_routes = create_v1_router(state.clone());

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", v1_routes)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create API v1 router; all of it sits behind the auth middleware.
fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/user/me",
            get(accounts::get_profile).put(accounts::update_profile),
        )
        .route("/balance", get(accounts::get_balance))
        .route("/deposits", post(accounts::deposit))
        .route("/withdrawals", post(accounts::withdraw))
        .route("/transactions", get(accounts::list_transactions))
        .route("/reconciliation", get(accounts::reconcile))
        .route("/sessions", post(sessions::start_session))
        .route("/sessions/{session_id}", get(sessions::get_session))
        .route("/sessions/{session_id}/bets", post(sessions::place_bet))
        .route("/sessions/{session_id}/close", post(sessions::close_session))
        .route("/operators", post(operators::create_operator))
        .route("/operators/{operator_id}", get(operators::get_operator))
        .route(
            "/operators/{operator_id}/totals",
            get(operators::get_totals),
        )
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth_middleware,
        ))
}

/// Record metrics and logs for a ledger call, passing the result through.
pub(crate) fn observe<T>(
    operation: &str,
    user_id: UserId,
    result: LedgerResult<T>,
) -> LedgerResult<T> {
    match &result {
        Ok(_) => metrics::ledger_operation(operation, "ok"),
        Err(err) => {
            metrics::ledger_operation(operation, err.code());
            if matches!(err, LedgerError::ConcurrencyConflict { .. }) {
                metrics::ledger_conflicts_total(operation);
            }
            let server_fault = matches!(
                err,
                LedgerError::PersistenceFailure(_) | LedgerError::CorruptRecord(_)
            );
            logging::log_ledger_rejection(
                operation,
                user_id,
                err.code(),
                server_fault,
                &err.to_string(),
            );
        }
    }
    result
}

/// Health check endpoint for monitoring and load balancers.
///
/// Probes the ledger store with a round trip to its backend.
///
/// # Response
///
/// Returns `200 OK` if the store answers, or `503 Service Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","store":true,"timestamp":"2026-10-14T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = match state.ledger.store().health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            false
        }
    };

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
