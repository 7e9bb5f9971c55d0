//! Operator API handlers.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use wager_ledger::{
    UserId,
    identity::{Role, VerifiedIdentity},
    session::{NewOperator, Operator, OperatorId, OperatorTotals},
};

use super::{AppState, error::ApiError, middleware::require_role, observe};

#[derive(Debug, Deserialize)]
pub struct TotalsQuery {
    /// Recompute instead of serving the cached rollup
    #[serde(default)]
    pub refresh: bool,
}

/// Register an operator; omitted balances default to 100000.
/// Requires the `operator_admin` role.
///
/// # Errors
///
/// - `400 Bad Request`: Negative starting balance
/// - `403 Forbidden`: Caller is not an operator admin
/// - `409 Conflict`: Name already taken
pub async fn create_operator(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(request): Json<NewOperator>,
) -> Result<(StatusCode, Json<Operator>), ApiError> {
    require_role(&identity, user_id, Role::OperatorAdmin)?;
    let operator = observe(
        "create_operator",
        user_id,
        state.ledger.create_operator(request).await,
    )?;
    Ok((StatusCode::CREATED, Json(operator)))
}

pub async fn get_operator(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
) -> Result<Json<Operator>, ApiError> {
    Ok(Json(state.ledger.operator(operator_id).await?))
}

/// Operator rollup.
///
/// Served from the aggregator cache, which the background task refreshes
/// periodically; `?refresh=true` recomputes it now.
pub async fn get_totals(
    State(state): State<AppState>,
    Path(operator_id): Path<OperatorId>,
    Query(query): Query<TotalsQuery>,
) -> Result<Json<OperatorTotals>, ApiError> {
    let totals = if query.refresh {
        state.aggregator.refresh(operator_id).await?
    } else {
        state.aggregator.totals(operator_id).await?
    };
    Ok(Json(totals))
}
