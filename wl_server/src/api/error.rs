//! Mapping of ledger and identity errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use wager_ledger::{
    LedgerError,
    identity::{IdentityError, Role},
};

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Handler error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Authenticated, but without the role the endpoint needs
    #[error("Requires the {0} role")]
    MissingRole(Role),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Identity(_) => StatusCode::UNAUTHORIZED,
            ApiError::MissingRole(_) => StatusCode::FORBIDDEN,
            ApiError::Ledger(err) => match err {
                LedgerError::InvalidAmount { .. }
                | LedgerError::InvalidExpiry { .. }
                | LedgerError::InvalidSessionTransition(_) => StatusCode::BAD_REQUEST,
                LedgerError::IdentityConflict { .. } => StatusCode::UNAUTHORIZED,
                LedgerError::InsufficientFunds { .. } | LedgerError::BalanceOverflow => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                LedgerError::WithdrawalBlocked(_) => StatusCode::FORBIDDEN,
                LedgerError::ConcurrencyConflict { .. }
                | LedgerError::SessionClosed { .. }
                | LedgerError::UserAlreadyExists(_)
                | LedgerError::OperatorAlreadyExists(_) => StatusCode::CONFLICT,
                LedgerError::AccountNotFound(_)
                | LedgerError::SessionNotFound(_)
                | LedgerError::OperatorNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Ledger(err) => err.code(),
            ApiError::Identity(IdentityError::MissingToken) => "missing_token",
            ApiError::Identity(_) => "invalid_token",
            ApiError::MissingRole(_) => "forbidden",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: match &self {
                ApiError::Ledger(err) => err.client_message(),
                ApiError::Identity(err) => err.client_message(),
                ApiError::MissingRole(_) => self.to_string(),
            },
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
