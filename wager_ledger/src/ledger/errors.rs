//! Ledger error types.

use crate::{
    UserId,
    session::{OperatorId, SessionId, SessionStatus},
};
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Reason a withdrawal was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawalBlock {
    /// Bonus wagering requirement has not been played through
    WageringOutstanding { remaining: i64 },

    /// Requested more than the withdrawable real balance
    ExceedsBalance { available: i64, requested: i64 },
}

impl fmt::Display for WithdrawalBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalBlock::WageringOutstanding { remaining } => {
                write!(f, "wagering requirement outstanding ({remaining} remaining)")
            }
            WithdrawalBlock::ExceedsBalance {
                available,
                requested,
            } => write!(
                f,
                "requested {requested} exceeds real balance {available}"
            ),
        }
    }
}

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Non-positive or malformed amount
    #[error("Invalid amount for {field}: {amount}")]
    InvalidAmount { field: &'static str, amount: i64 },

    /// Bonus expiry already passed, or set on an entry without a bonus
    #[error("Invalid bonus expiry: {expires_at}")]
    InvalidExpiry { expires_at: DateTime<Utc> },

    /// Bet exceeds combined real and bonus balance
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Withdrawal refused
    #[error("Withdrawal blocked: {0}")]
    WithdrawalBlocked(WithdrawalBlock),

    /// Balance row changed between read and write
    #[error("Concurrent update detected for user {user_id}")]
    ConcurrencyConflict { user_id: UserId },

    /// Storage unavailable or query failed
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] sqlx::Error),

    /// No balance/user record for this user
    #[error("Account not found for user {0}")]
    AccountNotFound(UserId),

    /// A user with this auth identifier or email already exists
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// Email already belongs to an account opened under another auth identifier
    #[error("Email {email} is linked to a different identity")]
    IdentityConflict { email: String },

    /// Session does not exist or belongs to another user
    #[error("Game session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session already reached a terminal status
    #[error("Game session {session_id} is closed ({status})")]
    SessionClosed {
        session_id: SessionId,
        status: SessionStatus,
    },

    /// Requested status change is not allowed
    #[error("Invalid session transition to {0}")]
    InvalidSessionTransition(SessionStatus),

    /// Operator does not exist
    #[error("Operator not found: {0}")]
    OperatorNotFound(OperatorId),

    /// An operator with this name already exists
    #[error("Operator already exists: {0}")]
    OperatorAlreadyExists(String),

    /// Arithmetic overflow while applying a mutation
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Stored row could not be decoded
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),
}

impl LedgerError {
    /// Whether the operation may be retried automatically.
    ///
    /// Only lost-update conflicts qualify; everything else is terminal for
    /// the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict { .. })
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::PersistenceFailure(_) | LedgerError::CorruptRecord(_) => {
                "Internal server error".to_string()
            }
            LedgerError::AccountNotFound(_) => "Account not found".to_string(),
            LedgerError::ConcurrencyConflict { .. } => {
                "Balance changed concurrently, please retry".to_string()
            }
            LedgerError::IdentityConflict { .. } => {
                "This email belongs to an account opened with a different sign-in".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "invalid_amount",
            LedgerError::InvalidExpiry { .. } => "invalid_expiry",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::WithdrawalBlocked(_) => "withdrawal_blocked",
            LedgerError::ConcurrencyConflict { .. } => "concurrency_conflict",
            LedgerError::PersistenceFailure(_) => "persistence_failure",
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::UserAlreadyExists(_) => "user_already_exists",
            LedgerError::IdentityConflict { .. } => "identity_conflict",
            LedgerError::SessionNotFound(_) => "session_not_found",
            LedgerError::SessionClosed { .. } => "session_closed",
            LedgerError::InvalidSessionTransition(_) => "invalid_session_transition",
            LedgerError::OperatorNotFound(_) => "operator_not_found",
            LedgerError::OperatorAlreadyExists(_) => "operator_already_exists",
            LedgerError::BalanceOverflow => "balance_overflow",
            LedgerError::CorruptRecord(_) => "corrupt_record",
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
