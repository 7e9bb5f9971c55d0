//! Account API handlers.
//!
//! Profile, balance, money movement and the per-user journal. Handlers act
//! on the authenticated user injected by the auth middleware, except
//! deposits, which a cashier posts to a player's account.
//!
//! # Examples
//!
//! Cashier crediting a deposit with a bonus to user 42:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/deposits \
//!   -H "Authorization: Bearer CASHIER_TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"user_id": 42, "amount": 5000, "bonus_amount": 2500}'
//! ```

use axum::{
    Json,
    extract::{Extension, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use wager_ledger::{
    Amount, Balance, DepositRequest, User, UserId, WithdrawalRequest,
    identity::{Role, VerifiedIdentity},
    journal::{JournalEntry, ReconciliationReport},
    ledger::is_withdrawal_eligible,
};

use super::{AppState, error::ApiError, middleware::require_role, observe};
use crate::metrics;

/// Default page size for `/transactions`
pub const DEFAULT_TRANSACTION_LIMIT: i64 = 50;

/// Largest page size for `/transactions`
pub const MAX_TRANSACTION_LIMIT: i64 = 500;

/// Balance with derived fields
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    #[serde(flatten)]
    pub balance: Balance,
    /// Real plus bonus balance
    pub playable: Amount,
    /// Whether the bonus playthrough is complete
    pub withdrawal_eligible: bool,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            playable: balance.playable(),
            withdrawal_eligible: is_withdrawal_eligible(&balance),
            balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub balance: BalanceResponse,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
}

/// Deposit posted by a cashier
#[derive(Debug, Deserialize)]
pub struct CashierDepositRequest {
    /// Credited account; the cashier's own when omitted
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(flatten)]
    pub deposit: DepositRequest,
}

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub limit: Option<i64>,
}

/// Current user's profile and balance.
///
/// # Response
///
/// Returns `200 OK` with `{ "user": {...}, "balance": {...} }`.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = state.ledger.get_user(user_id).await?;
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(ProfileResponse {
        user,
        balance: balance.into(),
    }))
}

/// Update the display name; blank or missing clears it.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .ledger
        .update_display_name(user_id, request.display_name)
        .await?;
    Ok(Json(user))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.balance(user_id).await?;
    Ok(Json(balance.into()))
}

/// Credit a deposit and/or bonus to a player. Requires the `cashier` role.
///
/// # Request Body
///
/// ```json
/// {
///   "user_id": 42,
///   "kind": "DEPOSIT_CASHAPP",
///   "amount": 5000,
///   "bonus_amount": 2500,
///   "operator_id": "00000000-0000-0000-0000-000000000000"
/// }
/// ```
///
/// Only `amount` is required. The entry's `cashier_id` is always the caller.
///
/// # Errors
///
/// - `400 Bad Request`: Negative amounts, nothing credited, a withdrawal kind, or a past expiry
/// - `403 Forbidden`: Caller is not a cashier
/// - `404 Not Found`: Unknown account or operator
pub async fn deposit(
    State(state): State<AppState>,
    Extension(cashier_id): Extension<UserId>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(request): Json<CashierDepositRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), ApiError> {
    require_role(&identity, cashier_id, Role::Cashier)?;

    let user_id = request.user_id.unwrap_or(cashier_id);
    let deposit = DepositRequest {
        cashier_id: Some(cashier_id),
        ..request.deposit
    };
    let credited = deposit.amount.saturating_add(deposit.bonus_amount);
    let balance = observe(
        "deposit",
        user_id,
        state.ledger.apply_deposit(user_id, deposit).await,
    )?;
    metrics::ledger_amount("deposit", credited);
    Ok((StatusCode::CREATED, Json(balance.into())))
}

/// Withdraw from the real balance.
///
/// A `cashier_id` in the body is kept only when the caller is a cashier.
///
/// # Errors
///
/// - `403 Forbidden`: Wagering outstanding or amount above the real balance
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(mut request): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<BalanceResponse>), ApiError> {
    if !identity.has_role(Role::Cashier) {
        request.cashier_id = None;
    }
    let amount = request.amount;
    let balance = observe(
        "withdrawal",
        user_id,
        state.ledger.apply_withdrawal(user_id, request).await,
    )?;
    metrics::ledger_amount("withdrawal", amount);
    Ok((StatusCode::CREATED, Json(balance.into())))
}

/// Deposits and bets merged, newest first.
///
/// `limit` defaults to 50 and is clamped to `1..=500`.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRANSACTION_LIMIT)
        .clamp(1, MAX_TRANSACTION_LIMIT);
    let entries = state.ledger.journal(user_id, Some(limit)).await?;
    Ok(Json(entries))
}

pub async fn reconcile(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let report = observe(
        "reconcile",
        user_id,
        state.ledger.reconcile(user_id).await,
    )?;
    Ok(Json(report))
}
