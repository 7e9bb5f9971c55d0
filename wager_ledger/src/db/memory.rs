//! In-process ledger store.
//!
//! All state sits behind one `RwLock`, so every commit is a single critical
//! section and readers never observe a balance without its journal entry.
//! Used by tests and the server's `--in-memory` mode.

use super::repository::LedgerStore;
use crate::journal::{BetLogEntry, DepositKind, DepositLogEntry};
use crate::ledger::{Balance, LedgerError, LedgerResult, NewUser, User, UserId};
use crate::session::{
    GameSession, HOUSE_OPERATOR_ID, NewOperator, Operator, OperatorId, OperatorTotals, SessionId,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_user_id: UserId,
    users: HashMap<UserId, User>,
    balances: HashMap<UserId, Balance>,
    deposits: Vec<DepositLogEntry>,
    bets: Vec<BetLogEntry>,
    sessions: HashMap<SessionId, GameSession>,
    operators: Vec<Operator>,
}

impl State {
    fn check_version(&self, balance: &Balance, expected_version: i64) -> LedgerResult<()> {
        let current = self
            .balances
            .get(&balance.user_id)
            .ok_or(LedgerError::AccountNotFound(balance.user_id))?;
        if current.version != expected_version {
            return Err(LedgerError::ConcurrencyConflict {
                user_id: balance.user_id,
            });
        }
        Ok(())
    }
}

fn newest_first<T>(entries: impl DoubleEndedIterator<Item = T>, limit: Option<i64>) -> Vec<T> {
    let limit = limit.map_or(usize::MAX, |n| usize::try_from(n.max(0)).unwrap_or(usize::MAX));
    entries.rev().take(limit).collect()
}

/// Ledger store backed by process memory
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
}

impl InMemoryLedgerStore {
    /// Create an empty store holding only the house operator
    pub fn new() -> Self {
        let mut house = NewOperator::named("House").into_operator(Utc::now());
        house.id = HOUSE_OPERATOR_ID;

        Self {
            state: RwLock::new(State {
                next_user_id: 1,
                operators: vec![house],
                ..State::default()
            }),
        }
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn health_check(&self) -> LedgerResult<()> {
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> LedgerResult<User> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.auth_id == new_user.auth_id || u.email == new_user.email)
        {
            return Err(LedgerError::UserAlreadyExists(new_user.auth_id));
        }

        let now = Utc::now();
        let id = state.next_user_id;
        state.next_user_id += 1;

        let user = User {
            id,
            auth_id: new_user.auth_id,
            email: new_user.email,
            display_name: new_user.display_name,
            created_at: now,
        };
        state.users.insert(id, user.clone());
        state.balances.insert(id, Balance::empty(id, now));
        Ok(user)
    }

    async fn find_user_by_auth_id(&self, auth_id: &str) -> LedgerResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.auth_id == auth_id).cloned())
    }

    async fn find_user(&self, user_id: UserId) -> LedgerResult<Option<User>> {
        Ok(self.state.read().await.users.get(&user_id).cloned())
    }

    async fn update_display_name(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
    ) -> LedgerResult<User> {
        let mut state = self.state.write().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(LedgerError::AccountNotFound(user_id))?;
        user.display_name = display_name.map(str::to_string);
        Ok(user.clone())
    }

    async fn load_balance(&self, user_id: UserId) -> LedgerResult<Balance> {
        self.state
            .read()
            .await
            .balances
            .get(&user_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(user_id))
    }

    async fn commit_deposit(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &DepositLogEntry,
    ) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        state.check_version(balance, expected_version)?;
        state.balances.insert(balance.user_id, balance.clone());
        state.deposits.push(entry.clone());
        Ok(())
    }

    async fn commit_bet(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &BetLogEntry,
    ) -> LedgerResult<GameSession> {
        let mut state = self.state.write().await;
        state.check_version(balance, expected_version)?;

        let session = state
            .sessions
            .get_mut(&entry.game_session_id)
            .filter(|s| s.user_id == entry.user_id)
            .ok_or(LedgerError::SessionNotFound(entry.game_session_id))?;
        if !session.status.accepts_bets() {
            return Err(LedgerError::SessionClosed {
                session_id: session.id,
                status: session.status,
            });
        }
        session.record_bet(entry.wager_amount, entry.win_amount, entry.created_at);
        let session = session.clone();

        state.balances.insert(balance.user_id, balance.clone());
        state.bets.push(entry.clone());
        Ok(session)
    }

    async fn deposit_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<DepositLogEntry>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state.deposits.iter().filter(|e| e.user_id == user_id).cloned(),
            limit,
        ))
    }

    async fn bet_log(&self, user_id: UserId, limit: Option<i64>) -> LedgerResult<Vec<BetLogEntry>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state.bets.iter().filter(|e| e.user_id == user_id).cloned(),
            limit,
        ))
    }

    async fn create_session(&self, session: &GameSession) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        state.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> LedgerResult<Option<GameSession>> {
        Ok(self.state.read().await.sessions.get(&session_id).cloned())
    }

    async fn close_session(&self, session: &GameSession) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        let stored = state
            .sessions
            .get_mut(&session.id)
            .ok_or(LedgerError::SessionNotFound(session.id))?;
        if !stored.status.accepts_bets() {
            return Err(LedgerError::SessionClosed {
                session_id: stored.id,
                status: stored.status,
            });
        }
        *stored = session.clone();
        Ok(())
    }

    async fn create_operator(&self, operator: &Operator) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        if state.operators.iter().any(|o| o.name == operator.name) {
            return Err(LedgerError::OperatorAlreadyExists(operator.name.clone()));
        }
        state.operators.push(operator.clone());
        Ok(())
    }

    async fn get_operator(&self, operator_id: OperatorId) -> LedgerResult<Option<Operator>> {
        let state = self.state.read().await;
        Ok(state.operators.iter().find(|o| o.id == operator_id).cloned())
    }

    async fn list_operators(&self) -> LedgerResult<Vec<Operator>> {
        Ok(self.state.read().await.operators.clone())
    }

    async fn operator_totals(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals> {
        let state = self.state.read().await;
        if !state.operators.iter().any(|o| o.id == operator_id) {
            return Err(LedgerError::OperatorNotFound(operator_id));
        }

        let mut totals = OperatorTotals {
            operator_id,
            total_wagered: 0,
            total_won: 0,
            bet_count: 0,
            session_count: 0,
            player_count: 0,
            total_deposited: 0,
            total_withdrawn: 0,
            total_bonus_granted: 0,
            gross_gaming_revenue: 0,
            computed_at: Utc::now(),
        };
        let mut players = HashSet::new();

        // Rollups are reporting state; they pin at the bounds instead of failing
        for bet in state.bets.iter().filter(|b| b.operator_id == operator_id) {
            totals.total_wagered = totals.total_wagered.saturating_add(bet.wager_amount);
            totals.total_won = totals.total_won.saturating_add(bet.win_amount);
            totals.bet_count = totals.bet_count.saturating_add(1);
        }
        for session in state.sessions.values().filter(|s| s.operator_id == operator_id) {
            totals.session_count = totals.session_count.saturating_add(1);
            players.insert(session.user_id);
        }
        for entry in state.deposits.iter().filter(|d| d.operator_id == operator_id) {
            if entry.kind == DepositKind::Withdrawal {
                totals.total_withdrawn =
                    totals.total_withdrawn.saturating_sub(entry.change.deposit_amount);
            } else {
                totals.total_deposited =
                    totals.total_deposited.saturating_add(entry.change.deposit_amount);
                totals.total_bonus_granted = totals
                    .total_bonus_granted
                    .saturating_add(entry.change.bonus_awarded_amount);
            }
            players.insert(entry.user_id);
        }

        totals.player_count = i64::try_from(players.len()).unwrap_or(i64::MAX);
        totals.gross_gaming_revenue = totals.total_wagered.saturating_sub(totals.total_won);
        Ok(totals)
    }
}
