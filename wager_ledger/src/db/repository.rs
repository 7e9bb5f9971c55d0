//! Storage trait for the ledger.
//!
//! The ledger computes every state transition itself and hands the store a
//! finished balance plus its journal entry. The store's only job is to
//! persist both atomically, and only if the balance row still carries the
//! version the ledger read.

use async_trait::async_trait;

use crate::journal::{BetLogEntry, DepositLogEntry};
use crate::ledger::{Balance, LedgerResult, NewUser, User, UserId};
use crate::session::{GameSession, Operator, OperatorId, OperatorTotals, SessionId};

/// Persistence operations required by [`crate::ledger::Ledger`]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Round trip to the backend, used by readiness checks
    async fn health_check(&self) -> LedgerResult<()>;

    /// Create a user together with a zero balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::UserAlreadyExists` - Auth ID or email already taken
    async fn create_user(&self, new_user: NewUser) -> LedgerResult<User>;

    /// Find user by external auth identifier
    async fn find_user_by_auth_id(&self, auth_id: &str) -> LedgerResult<Option<User>>;

    /// Find user by ID
    async fn find_user(&self, user_id: UserId) -> LedgerResult<Option<User>>;

    /// Replace a user's display name
    async fn update_display_name(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
    ) -> LedgerResult<User>;

    /// Current balance snapshot
    ///
    /// # Errors
    ///
    /// * `LedgerError::AccountNotFound` - No balance row for this user
    async fn load_balance(&self, user_id: UserId) -> LedgerResult<Balance>;

    /// Persist a deposit, bonus grant or withdrawal
    ///
    /// # Errors
    ///
    /// * `LedgerError::ConcurrencyConflict` - Stored version differs from `expected_version`
    async fn commit_deposit(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &DepositLogEntry,
    ) -> LedgerResult<()>;

    /// Persist a bet and fold it into its game session
    ///
    /// # Returns
    ///
    /// * `LedgerResult<GameSession>` - Session with updated totals
    ///
    /// # Errors
    ///
    /// * `LedgerError::ConcurrencyConflict` - Stored version differs from `expected_version`
    /// * `LedgerError::SessionNotFound` - Session missing or owned by another user
    /// * `LedgerError::SessionClosed` - Session no longer accepts bets
    async fn commit_bet(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &BetLogEntry,
    ) -> LedgerResult<GameSession>;

    /// Deposit log, newest first; `None` returns everything
    async fn deposit_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<DepositLogEntry>>;

    /// Bet log, newest first; `None` returns everything
    async fn bet_log(&self, user_id: UserId, limit: Option<i64>) -> LedgerResult<Vec<BetLogEntry>>;

    /// Insert a new session
    async fn create_session(&self, session: &GameSession) -> LedgerResult<()>;

    /// Find session by ID
    async fn get_session(&self, session_id: SessionId) -> LedgerResult<Option<GameSession>>;

    /// Store a closed session, provided it is still active
    ///
    /// # Errors
    ///
    /// * `LedgerError::SessionClosed` - Session was closed concurrently
    async fn close_session(&self, session: &GameSession) -> LedgerResult<()>;

    /// Insert a new operator
    ///
    /// # Errors
    ///
    /// * `LedgerError::OperatorAlreadyExists` - Name already taken
    async fn create_operator(&self, operator: &Operator) -> LedgerResult<()>;

    /// Find operator by ID
    async fn get_operator(&self, operator_id: OperatorId) -> LedgerResult<Option<Operator>>;

    /// All operators, oldest first
    async fn list_operators(&self) -> LedgerResult<Vec<Operator>>;

    /// Roll up everything recorded against an operator
    async fn operator_totals(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals>;
}
