//! Ledger service: the only writer of balances and the journal.

use super::{
    errors::{LedgerError, LedgerResult},
    locks::UserLocks,
    models::{
        Balance, BetOutcome, BetRequest, DepositRequest, LedgerPolicy, NewUser, User, UserId,
        WithdrawalRequest,
    },
    transitions::{self, BetTransition, Transition},
};
use crate::{
    db::LedgerStore,
    identity::VerifiedIdentity,
    journal::{
        BetLogEntry, BetStatus, BonusStatus, DepositKind, DepositLogEntry, JournalEntry,
        ReconciliationReport, merge_chronological, reconcile,
    },
    outcome::OutcomeGenerator,
    session::{GameSession, NewOperator, Operator, OperatorId, SessionId, SessionStatus, StartSession},
};
use chrono::Utc;
use std::{future::Future, sync::Arc, time::Instant};
use uuid::Uuid;

fn page_limit(limit: Option<i64>) -> Option<i64> {
    limit.map(|n| n.max(0))
}

/// Balance ledger
///
/// Every mutation runs under the user's lock as a read-compute-commit
/// attempt. The store rejects the commit if the balance version moved since
/// the read, in which case the attempt is repeated from a fresh read.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    outcomes: Arc<dyn OutcomeGenerator>,
    policy: LedgerPolicy,
    locks: Arc<UserLocks>,
}

impl Ledger {
    /// Create a new ledger
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend
    /// * `outcomes` - Decides bet payouts
    /// * `policy` - Wagering multipliers and retry budget
    pub fn new(
        store: Arc<dyn LedgerStore>,
        outcomes: Arc<dyn OutcomeGenerator>,
        policy: LedgerPolicy,
    ) -> Self {
        Self {
            store,
            outcomes,
            policy,
            locks: Arc::new(UserLocks::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    /// Run `attempt` under the user's lock, retrying lost-update conflicts
    async fn retry_on_conflict<T, F, Fut>(
        &self,
        user_id: UserId,
        operation: &'static str,
        mut attempt: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let _guard = self.locks.acquire(user_id).await;
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && retries < self.policy.max_conflict_retries => {
                    retries += 1;
                    log::warn!(
                        "{} for user {} lost a concurrent update, retry {}/{}",
                        operation,
                        user_id,
                        retries,
                        self.policy.max_conflict_retries
                    );
                }
                Err(e) => {
                    if e.is_retryable() {
                        log::error!(
                            "{} for user {} still conflicting after {} retries",
                            operation,
                            user_id,
                            retries
                        );
                    }
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }

    async fn ensure_operator(&self, operator_id: OperatorId) -> LedgerResult<()> {
        match self.store.get_operator(operator_id).await? {
            Some(_) => Ok(()),
            None => Err(LedgerError::OperatorNotFound(operator_id)),
        }
    }

    /// Find the local user for a verified identity, creating it on first sight
    ///
    /// # Errors
    ///
    /// * `LedgerError::IdentityConflict` - The email already belongs to an
    ///   account opened under a different auth identifier
    pub async fn open_account(&self, identity: &VerifiedIdentity) -> LedgerResult<User> {
        if let Some(user) = self.store.find_user_by_auth_id(&identity.auth_id).await? {
            return Ok(user);
        }

        let new_user = NewUser {
            auth_id: identity.auth_id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
        };
        match self.store.create_user(new_user).await {
            Ok(user) => {
                log::info!("Opened account {} for {}", user.id, user.email);
                Ok(user)
            }
            // Either a lost first-login race, where the winner's row is the
            // account, or the email is taken by another identity
            Err(LedgerError::UserAlreadyExists(_)) => {
                match self.store.find_user_by_auth_id(&identity.auth_id).await? {
                    Some(user) => Ok(user),
                    None => {
                        log::warn!(
                            "Refused account for auth id {}: email {} is linked to another identity",
                            identity.auth_id,
                            identity.email
                        );
                        Err(LedgerError::IdentityConflict {
                            email: identity.email.clone(),
                        })
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_user(&self, user_id: UserId) -> LedgerResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    /// Replace the display name; blank names clear it
    pub async fn update_display_name(
        &self,
        user_id: UserId,
        display_name: Option<String>,
    ) -> LedgerResult<User> {
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self.store
            .update_display_name(user_id, display_name.as_deref())
            .await
    }

    /// Current balance snapshot
    pub async fn balance(&self, user_id: UserId) -> LedgerResult<Balance> {
        self.store.load_balance(user_id).await
    }

    /// Credit a deposit and/or bonus
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Negative amounts, nothing credited, or a cash kind without cash
    /// * `LedgerError::InvalidExpiry` - Bonus expiry not in the future
    /// * `LedgerError::OperatorNotFound` - Unknown operator
    pub async fn apply_deposit(
        &self,
        user_id: UserId,
        request: DepositRequest,
    ) -> LedgerResult<Balance> {
        transitions::validate_deposit(&request)?;
        transitions::validate_expiry(&request, Utc::now())?;
        self.ensure_operator(request.operator_id).await?;

        let balance = self
            .retry_on_conflict(user_id, "deposit", || self.try_deposit(user_id, &request))
            .await?;

        log::info!(
            "{} for user {}: +{} real, +{} bonus (version {})",
            request.kind,
            user_id,
            request.amount,
            request.bonus_amount,
            balance.version
        );
        Ok(balance)
    }

    async fn try_deposit(&self, user_id: UserId, request: &DepositRequest) -> LedgerResult<Balance> {
        let before = self.store.load_balance(user_id).await?;
        let now = Utc::now();
        let Transition { balance, change } =
            transitions::deposit(&before, request, &self.policy, now)?;

        let entry = DepositLogEntry {
            id: Uuid::new_v4(),
            user_id,
            cashier_id: request.cashier_id,
            operator_id: request.operator_id,
            game_name: request.game_name.clone(),
            kind: request.kind,
            balance_version: balance.version,
            change,
            metadata: request.metadata.clone(),
            bonus_status: BonusStatus::on_grant(request.bonus_amount),
            expires_at: request.expires_at,
            activated_at: (request.bonus_amount > 0).then_some(now),
            completed_at: None,
            created_at: now,
        };

        self.store
            .commit_deposit(before.version, &balance, &entry)
            .await?;
        Ok(balance)
    }

    /// Place a wager on an active session and settle its payout
    ///
    /// The payout is drawn once, before any commit attempt, so a retried
    /// commit never re-rolls the game.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Wager not positive
    /// * `LedgerError::SessionNotFound` - Unknown session or owned by another user
    /// * `LedgerError::SessionClosed` - Session no longer active
    /// * `LedgerError::InsufficientFunds` - Wager exceeds real + bonus; nothing is recorded
    pub async fn apply_bet(&self, user_id: UserId, request: BetRequest) -> LedgerResult<BetOutcome> {
        let started = Instant::now();
        if request.wager_amount <= 0 {
            return Err(LedgerError::InvalidAmount {
                field: "wager_amount",
                amount: request.wager_amount,
            });
        }

        let session = self.owned_session(user_id, request.session_id).await?;
        if !session.status.accepts_bets() {
            return Err(LedgerError::SessionClosed {
                session_id: session.id,
                status: session.status,
            });
        }

        let win = self.outcomes.win_amount(request.wager_amount).max(0);

        let outcome = self
            .retry_on_conflict(user_id, "bet", || {
                self.try_bet(user_id, &request, &session, win, started)
            })
            .await?;

        log::debug!(
            "Bet {} on session {}: wager {} (bonus {}, real {}), win {}",
            outcome.entry.id,
            session.id,
            request.wager_amount,
            outcome.bonus_wager,
            outcome.real_wager,
            win
        );
        Ok(outcome)
    }

    async fn try_bet(
        &self,
        user_id: UserId,
        request: &BetRequest,
        session: &GameSession,
        win: i64,
        started: Instant,
    ) -> LedgerResult<BetOutcome> {
        let before = self.store.load_balance(user_id).await?;
        let now = Utc::now();
        let BetTransition { transition, split } =
            transitions::bet(&before, request.wager_amount, win, now)?;

        let entry = BetLogEntry {
            id: Uuid::new_v4(),
            user_id,
            game_session_id: session.id,
            operator_id: session.operator_id,
            status: BetStatus::Completed,
            wager_amount: request.wager_amount,
            win_amount: win,
            bonus_wager: split.bonus_wager,
            real_wager: split.real_wager,
            balance_version: transition.balance.version,
            change: transition.change,
            game_id: session.game_id,
            game_name: session.game_name.clone(),
            jackpot_contribution: request.jackpot_contribution,
            vip_points_added: request.vip_points,
            processing_time_ms: Some(
                i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX),
            ),
            metadata: request.metadata.clone(),
            created_at: now,
        };

        let session = self
            .store
            .commit_bet(before.version, &transition.balance, &entry)
            .await?;

        Ok(BetOutcome {
            balance: transition.balance,
            win_amount: win,
            bonus_wager: split.bonus_wager,
            real_wager: split.real_wager,
            entry,
            session,
        })
    }

    /// Pay out real balance once the bonus playthrough is complete
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - Amount not positive
    /// * `LedgerError::WithdrawalBlocked` - Wagering outstanding or amount exceeds real balance
    pub async fn apply_withdrawal(
        &self,
        user_id: UserId,
        request: WithdrawalRequest,
    ) -> LedgerResult<Balance> {
        if request.amount <= 0 {
            return Err(LedgerError::InvalidAmount {
                field: "amount",
                amount: request.amount,
            });
        }
        self.ensure_operator(request.operator_id).await?;

        let result = self
            .retry_on_conflict(user_id, "withdrawal", || {
                self.try_withdrawal(user_id, &request)
            })
            .await;

        match &result {
            Ok(balance) => log::info!(
                "Withdrawal for user {}: -{} (version {})",
                user_id,
                request.amount,
                balance.version
            ),
            Err(LedgerError::WithdrawalBlocked(reason)) => {
                log::info!("Withdrawal for user {} blocked: {}", user_id, reason)
            }
            Err(_) => {}
        }
        result
    }

    async fn try_withdrawal(
        &self,
        user_id: UserId,
        request: &WithdrawalRequest,
    ) -> LedgerResult<Balance> {
        let before = self.store.load_balance(user_id).await?;
        let now = Utc::now();
        let Transition { balance, change } = transitions::withdrawal(&before, request.amount, now)?;

        let entry = DepositLogEntry {
            id: Uuid::new_v4(),
            user_id,
            cashier_id: request.cashier_id,
            operator_id: request.operator_id,
            game_name: None,
            kind: DepositKind::Withdrawal,
            balance_version: balance.version,
            change,
            metadata: request.metadata.clone(),
            bonus_status: None,
            expires_at: None,
            activated_at: None,
            completed_at: Some(now),
            created_at: now,
        };

        self.store
            .commit_deposit(before.version, &balance, &entry)
            .await?;
        Ok(balance)
    }

    /// Open a game session at the player's current playable balance
    pub async fn start_session(
        &self,
        user_id: UserId,
        request: StartSession,
    ) -> LedgerResult<GameSession> {
        self.ensure_operator(request.operator_id).await?;
        let balance = self.store.load_balance(user_id).await?;

        let session = GameSession::start(user_id, request, balance.playable(), Utc::now());
        self.store.create_session(&session).await?;

        log::info!(
            "Started session {} for user {} on game {}",
            session.id,
            user_id,
            session.game_id
        );
        Ok(session)
    }

    /// Move an active session to a terminal status
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidSessionTransition` - `status` is not terminal
    /// * `LedgerError::SessionClosed` - Session already closed
    pub async fn close_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
        status: SessionStatus,
    ) -> LedgerResult<GameSession> {
        if !status.is_terminal() {
            return Err(LedgerError::InvalidSessionTransition(status));
        }

        // Bets for this user are serialized behind the same lock
        let _guard = self.locks.acquire(user_id).await;

        let mut session = self.owned_session(user_id, session_id).await?;
        if !session.status.accepts_bets() {
            return Err(LedgerError::SessionClosed {
                session_id,
                status: session.status,
            });
        }

        let balance = self.store.load_balance(user_id).await?;
        session.close(status, balance.playable(), Utc::now());
        self.store.close_session(&session).await?;

        log::info!(
            "Closed session {} as {} after {} bet(s), rtp {} bps",
            session.id,
            status,
            session.total_bets,
            session.rtp_bps
        );
        Ok(session)
    }

    /// Session by ID, regardless of owner
    pub async fn session(&self, session_id: SessionId) -> LedgerResult<GameSession> {
        self.store
            .get_session(session_id)
            .await?
            .ok_or(LedgerError::SessionNotFound(session_id))
    }

    /// Session by ID, hidden from everyone but its owner
    pub async fn owned_session(
        &self,
        user_id: UserId,
        session_id: SessionId,
    ) -> LedgerResult<GameSession> {
        match self.store.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(LedgerError::SessionNotFound(session_id)),
        }
    }

    /// Deposit, bonus and withdrawal history, newest first
    ///
    /// Negative limits are treated as zero.
    pub async fn deposit_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<DepositLogEntry>> {
        self.store.deposit_log(user_id, page_limit(limit)).await
    }

    /// Bet history, newest first
    pub async fn bet_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<BetLogEntry>> {
        self.store.bet_log(user_id, page_limit(limit)).await
    }

    /// Both logs merged, newest first; `None` returns everything
    pub async fn journal(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let limit = page_limit(limit);
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let deposits = self.store.deposit_log(user_id, limit).await?;
        let bets = self.store.bet_log(user_id, limit).await?;
        let mut entries = merge_chronological(deposits, bets);
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }
        Ok(entries)
    }

    /// Replay the journal and compare it with the stored balance
    pub async fn reconcile(&self, user_id: UserId) -> LedgerResult<ReconciliationReport> {
        let balance = self.store.load_balance(user_id).await?;
        let deposits = self.store.deposit_log(user_id, None).await?;
        let bets = self.store.bet_log(user_id, None).await?;

        // Entries committed after the balance read belong to a later snapshot
        let entries: Vec<JournalEntry> = merge_chronological(deposits, bets)
            .into_iter()
            .filter(|entry| entry.balance_version() <= balance.version)
            .collect();

        let report = reconcile(user_id, &entries, &balance);
        if !report.is_consistent() {
            log::error!(
                "Reconciliation failed for user {}: replayed real {} vs actual {}, {} chain break(s), {} missing version(s)",
                user_id,
                report.replayed_real,
                report.actual_real,
                report.chain_breaks.len(),
                report.missing_versions.len()
            );
        }
        Ok(report)
    }

    /// Register a new operator
    pub async fn create_operator(&self, request: NewOperator) -> LedgerResult<Operator> {
        for (field, amount) in [
            ("balance", request.balance),
            ("slots_balance", request.slots_balance),
            ("arcade_balance", request.arcade_balance),
        ] {
            if amount < 0 {
                return Err(LedgerError::InvalidAmount { field, amount });
            }
        }

        let operator = request.into_operator(Utc::now());
        self.store.create_operator(&operator).await?;
        log::info!("Created operator {} '{}'", operator.id, operator.name);
        Ok(operator)
    }

    pub async fn operator(&self, operator_id: OperatorId) -> LedgerResult<Operator> {
        self.store
            .get_operator(operator_id)
            .await?
            .ok_or(LedgerError::OperatorNotFound(operator_id))
    }
}
