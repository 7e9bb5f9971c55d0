//! Game session API handlers.
//!
//! Sessions are private to the user that started them; another user's
//! session ID answers `404 Not Found`.
//!
//! # Examples
//!
//! Place a bet:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/sessions/SESSION_ID/bets \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"wager_amount": 100}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use wager_ledger::{
    Amount, BetOutcome, BetRequest, UserId,
    session::{GameSession, SessionId, SessionStatus, StartSession},
};

use super::{AppState, error::ApiError, observe};
use crate::metrics;

/// Bet body; the session comes from the path
#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub wager_amount: Amount,
    #[serde(default)]
    pub jackpot_contribution: Option<Amount>,
    #[serde(default)]
    pub vip_points: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PlaceBetRequest {
    fn into_bet(self, session_id: SessionId) -> BetRequest {
        BetRequest {
            session_id,
            wager_amount: self.wager_amount,
            jackpot_contribution: self.jackpot_contribution,
            vip_points: self.vip_points,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloseSessionRequest {
    #[serde(default = "completed")]
    pub status: SessionStatus,
}

fn completed() -> SessionStatus {
    SessionStatus::Completed
}

/// Start a session on a game.
///
/// # Request Body
///
/// ```json
/// {
///   "game_id": "5f0c...",
///   "game_name": "Lucky Sevens",
///   "operator_id": "00000000-0000-0000-0000-000000000000"
/// }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: Unknown operator
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<StartSession>,
) -> Result<(StatusCode, Json<GameSession>), ApiError> {
    let session = observe(
        "start_session",
        user_id,
        state.ledger.start_session(user_id, request).await,
    )?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<GameSession>, ApiError> {
    let session = state.ledger.owned_session(user_id, session_id).await?;
    Ok(Json(session))
}

/// Place a bet and settle it against the game outcome.
///
/// # Response
///
/// Returns `200 OK` with the new balance, the wager split, the payout, the
/// journal entry and the updated session.
///
/// # Errors
///
/// - `400 Bad Request`: Wager not positive
/// - `404 Not Found`: Session missing or not owned by the caller
/// - `409 Conflict`: Session closed, or the balance kept changing concurrently
/// - `422 Unprocessable Entity`: Wager exceeds real plus bonus balance
pub async fn place_bet(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<PlaceBetRequest>,
) -> Result<Json<BetOutcome>, ApiError> {
    let outcome = observe(
        "bet",
        user_id,
        state
            .ledger
            .apply_bet(user_id, request.into_bet(session_id))
            .await,
    )?;
    metrics::ledger_amount("bet", outcome.entry.wager_amount);
    metrics::bets_settled_total(outcome.entry.is_hit());
    Ok(Json(outcome))
}

/// Close a session; the body is optional and defaults to `COMPLETED`.
///
/// # Errors
///
/// - `400 Bad Request`: Requested status is not terminal
/// - `409 Conflict`: Session already closed
pub async fn close_session(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(session_id): Path<SessionId>,
    request: Option<Json<CloseSessionRequest>>,
) -> Result<Json<GameSession>, ApiError> {
    let status = request.map(|Json(r)| r.status).unwrap_or_else(completed);
    let session = observe(
        "close_session",
        user_id,
        state
            .ledger
            .close_session(user_id, session_id, status)
            .await,
    )?;
    Ok(Json(session))
}
