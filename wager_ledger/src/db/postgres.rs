//! PostgreSQL ledger store.
//!
//! Every commit runs in one SQL transaction: the balance row is locked with
//! `SELECT ... FOR UPDATE`, its version compared with the one the ledger
//! read, then the balance update and the journal insert are written
//! together. Dropping the transaction before `commit` rolls it back.

use super::repository::LedgerStore;
use crate::journal::{BalanceChange, BetLogEntry, DepositLogEntry};
use crate::ledger::{Balance, LedgerError, LedgerResult, NewUser, User, UserId};
use crate::session::{GameSession, Operator, OperatorId, OperatorTotals, SessionId};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

/// Schema applied by [`PgLedgerStore::migrate`]
pub const SCHEMA: &str = include_str!("../../migrations/001_ledger_schema.sql");

const USER_COLUMNS: &str = "id, auth_id, email, display_name, created_at";

const BALANCE_COLUMNS: &str = "user_id, real_balance, bonus_balance, free_spins_remaining,
    deposit_wagering_remaining, bonus_wagering_remaining, total_deposited_real,
    total_deposited_bonus, total_withdrawn, total_wagered, total_won, total_bonus_granted,
    total_free_spin_wins, version, created_at, updated_at";

const CHANGE_COLUMNS: &str = "deposit_amount, real_amount_before, real_amount_after,
    deposit_wagering_required_before, deposit_wagering_required_after, bonus_awarded_amount,
    bonus_balance_before, bonus_balance_after, bonus_wr_remaining_before, bonus_wr_remaining_after";

const SESSION_COLUMNS: &str = "id, user_id, game_id, game_name, operator_id, is_bot, status,
    total_wagered, total_won, total_bets, rtp_bps, player_starting_balance,
    player_ending_balance, duration_secs, created_at, updated_at, closed_at";

const OPERATOR_COLUMNS: &str = "id, name, balance, slots_balance, arcade_balance, current_float,
    is_active, owner_id, updated_by, products, version, created_at, updated_at";

fn user_from_row(r: &PgRow) -> LedgerResult<User> {
    Ok(User {
        id: r.try_get("id")?,
        auth_id: r.try_get("auth_id")?,
        email: r.try_get("email")?,
        display_name: r.try_get("display_name")?,
        created_at: r.try_get("created_at")?,
    })
}

fn balance_from_row(r: &PgRow) -> LedgerResult<Balance> {
    Ok(Balance {
        user_id: r.try_get("user_id")?,
        real_balance: r.try_get("real_balance")?,
        bonus_balance: r.try_get("bonus_balance")?,
        free_spins_remaining: r.try_get("free_spins_remaining")?,
        deposit_wagering_remaining: r.try_get("deposit_wagering_remaining")?,
        bonus_wagering_remaining: r.try_get("bonus_wagering_remaining")?,
        total_deposited_real: r.try_get("total_deposited_real")?,
        total_deposited_bonus: r.try_get("total_deposited_bonus")?,
        total_withdrawn: r.try_get("total_withdrawn")?,
        total_wagered: r.try_get("total_wagered")?,
        total_won: r.try_get("total_won")?,
        total_bonus_granted: r.try_get("total_bonus_granted")?,
        total_free_spin_wins: r.try_get("total_free_spin_wins")?,
        version: r.try_get("version")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn change_from_row(r: &PgRow) -> LedgerResult<BalanceChange> {
    Ok(BalanceChange {
        deposit_amount: r.try_get("deposit_amount")?,
        real_amount_before: r.try_get("real_amount_before")?,
        real_amount_after: r.try_get("real_amount_after")?,
        deposit_wagering_required_before: r.try_get("deposit_wagering_required_before")?,
        deposit_wagering_required_after: r.try_get("deposit_wagering_required_after")?,
        bonus_awarded_amount: r.try_get("bonus_awarded_amount")?,
        bonus_balance_before: r.try_get("bonus_balance_before")?,
        bonus_balance_after: r.try_get("bonus_balance_after")?,
        bonus_wr_remaining_before: r.try_get("bonus_wr_remaining_before")?,
        bonus_wr_remaining_after: r.try_get("bonus_wr_remaining_after")?,
    })
}

fn deposit_from_row(r: &PgRow) -> LedgerResult<DepositLogEntry> {
    Ok(DepositLogEntry {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        cashier_id: r.try_get("cashier_id")?,
        operator_id: r.try_get("operator_id")?,
        game_name: r.try_get("game_name")?,
        kind: r.try_get::<String, _>("kind")?.parse()?,
        balance_version: r.try_get("balance_version")?,
        change: change_from_row(r)?,
        metadata: r.try_get("metadata")?,
        bonus_status: r
            .try_get::<Option<String>, _>("bonus_status")?
            .map(|status| status.parse())
            .transpose()?,
        expires_at: r.try_get("expires_at")?,
        activated_at: r.try_get("activated_at")?,
        completed_at: r.try_get("completed_at")?,
        created_at: r.try_get("created_at")?,
    })
}

fn bet_from_row(r: &PgRow) -> LedgerResult<BetLogEntry> {
    Ok(BetLogEntry {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        game_session_id: r.try_get("game_session_id")?,
        operator_id: r.try_get("operator_id")?,
        status: r.try_get::<String, _>("status")?.parse()?,
        wager_amount: r.try_get("wager_amount")?,
        win_amount: r.try_get("win_amount")?,
        bonus_wager: r.try_get("bonus_wager")?,
        real_wager: r.try_get("real_wager")?,
        balance_version: r.try_get("balance_version")?,
        change: change_from_row(r)?,
        game_id: r.try_get("game_id")?,
        game_name: r.try_get("game_name")?,
        jackpot_contribution: r.try_get("jackpot_contribution")?,
        vip_points_added: r.try_get("vip_points_added")?,
        processing_time_ms: r.try_get("processing_time_ms")?,
        metadata: r.try_get("metadata")?,
        created_at: r.try_get("created_at")?,
    })
}

fn session_from_row(r: &PgRow) -> LedgerResult<GameSession> {
    Ok(GameSession {
        id: r.try_get("id")?,
        user_id: r.try_get("user_id")?,
        game_id: r.try_get("game_id")?,
        game_name: r.try_get("game_name")?,
        operator_id: r.try_get("operator_id")?,
        is_bot: r.try_get("is_bot")?,
        status: r.try_get::<String, _>("status")?.parse()?,
        total_wagered: r.try_get("total_wagered")?,
        total_won: r.try_get("total_won")?,
        total_bets: r.try_get("total_bets")?,
        rtp_bps: r.try_get("rtp_bps")?,
        player_starting_balance: r.try_get("player_starting_balance")?,
        player_ending_balance: r.try_get("player_ending_balance")?,
        duration_secs: r.try_get("duration_secs")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        closed_at: r.try_get("closed_at")?,
    })
}

fn operator_from_row(r: &PgRow) -> LedgerResult<Operator> {
    Ok(Operator {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        balance: r.try_get("balance")?,
        slots_balance: r.try_get("slots_balance")?,
        arcade_balance: r.try_get("arcade_balance")?,
        current_float: r.try_get("current_float")?,
        is_active: r.try_get("is_active")?,
        owner_id: r.try_get("owner_id")?,
        updated_by: r.try_get("updated_by")?,
        products: r.try_get("products")?,
        version: r.try_get("version")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Lock the balance row and confirm nobody committed since it was read
async fn lock_balance(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    expected_version: i64,
) -> LedgerResult<()> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT version FROM user_balances WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    match current {
        None => Err(LedgerError::AccountNotFound(user_id)),
        Some(version) if version != expected_version => {
            Err(LedgerError::ConcurrencyConflict { user_id })
        }
        Some(_) => Ok(()),
    }
}

async fn write_balance(
    tx: &mut Transaction<'_, Postgres>,
    expected_version: i64,
    b: &Balance,
) -> LedgerResult<()> {
    let result = sqlx::query(
        "UPDATE user_balances SET
            real_balance = $3, bonus_balance = $4, free_spins_remaining = $5,
            deposit_wagering_remaining = $6, bonus_wagering_remaining = $7,
            total_deposited_real = $8, total_deposited_bonus = $9, total_withdrawn = $10,
            total_wagered = $11, total_won = $12, total_bonus_granted = $13,
            total_free_spin_wins = $14, version = $15, updated_at = $16
         WHERE user_id = $1 AND version = $2",
    )
    .bind(b.user_id)
    .bind(expected_version)
    .bind(b.real_balance)
    .bind(b.bonus_balance)
    .bind(b.free_spins_remaining)
    .bind(b.deposit_wagering_remaining)
    .bind(b.bonus_wagering_remaining)
    .bind(b.total_deposited_real)
    .bind(b.total_deposited_bonus)
    .bind(b.total_withdrawn)
    .bind(b.total_wagered)
    .bind(b.total_won)
    .bind(b.total_bonus_granted)
    .bind(b.total_free_spin_wins)
    .bind(b.version)
    .bind(b.updated_at)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(LedgerError::ConcurrencyConflict { user_id: b.user_id });
    }
    Ok(())
}

/// Ledger store backed by PostgreSQL
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the ledger schema; safe to run on every start
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, new_user: NewUser) -> LedgerResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO users (auth_id, email, display_name) VALUES ($1, $2, $3)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.auth_id)
        .bind(&new_user.email)
        .bind(&new_user.display_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::UserAlreadyExists(new_user.auth_id.clone())
            } else {
                LedgerError::PersistenceFailure(e)
            }
        })?;
        let user = user_from_row(&row)?;

        sqlx::query("INSERT INTO user_balances (user_id, created_at, updated_at) VALUES ($1, $2, $2)")
            .bind(user.id)
            .bind(user.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    async fn find_user_by_auth_id(&self, auth_id: &str) -> LedgerResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE auth_id = $1"))
            .bind(auth_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user(&self, user_id: UserId) -> LedgerResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_display_name(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
    ) -> LedgerResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE users SET display_name = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;
        user_from_row(&row)
    }

    async fn load_balance(&self, user_id: UserId) -> LedgerResult<Balance> {
        let row = sqlx::query(&format!(
            "SELECT {BALANCE_COLUMNS} FROM user_balances WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::AccountNotFound(user_id))?;
        balance_from_row(&row)
    }

    async fn commit_deposit(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &DepositLogEntry,
    ) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_balance(&mut tx, balance.user_id, expected_version).await?;
        write_balance(&mut tx, expected_version, balance).await?;

        let c = &entry.change;
        sqlx::query(&format!(
            "INSERT INTO deposit_logs (id, user_id, cashier_id, operator_id, game_name, kind,
                balance_version, {CHANGE_COLUMNS}, metadata, bonus_status, expires_at,
                activated_at, completed_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23)"
        ))
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.cashier_id)
        .bind(entry.operator_id)
        .bind(&entry.game_name)
        .bind(entry.kind.as_str())
        .bind(entry.balance_version)
        .bind(c.deposit_amount)
        .bind(c.real_amount_before)
        .bind(c.real_amount_after)
        .bind(c.deposit_wagering_required_before)
        .bind(c.deposit_wagering_required_after)
        .bind(c.bonus_awarded_amount)
        .bind(c.bonus_balance_before)
        .bind(c.bonus_balance_after)
        .bind(c.bonus_wr_remaining_before)
        .bind(c.bonus_wr_remaining_after)
        .bind(&entry.metadata)
        .bind(entry.bonus_status.map(|status| status.as_str()))
        .bind(entry.expires_at)
        .bind(entry.activated_at)
        .bind(entry.completed_at)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn commit_bet(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &BetLogEntry,
    ) -> LedgerResult<GameSession> {
        let mut tx = self.pool.begin().await?;
        lock_balance(&mut tx, balance.user_id, expected_version).await?;

        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(entry.game_session_id)
        .fetch_optional(&mut *tx)
        .await?;
        let mut session = match row.as_ref().map(session_from_row).transpose()? {
            Some(session) if session.user_id == entry.user_id => session,
            _ => return Err(LedgerError::SessionNotFound(entry.game_session_id)),
        };
        if !session.status.accepts_bets() {
            return Err(LedgerError::SessionClosed {
                session_id: session.id,
                status: session.status,
            });
        }

        write_balance(&mut tx, expected_version, balance).await?;

        let c = &entry.change;
        sqlx::query(&format!(
            "INSERT INTO bet_logs (id, user_id, game_session_id, operator_id, status,
                wager_amount, win_amount, bonus_wager, real_wager, balance_version,
                {CHANGE_COLUMNS}, game_id, game_name, jackpot_contribution, vip_points_added,
                processing_time_ms, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27)"
        ))
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.game_session_id)
        .bind(entry.operator_id)
        .bind(entry.status.as_str())
        .bind(entry.wager_amount)
        .bind(entry.win_amount)
        .bind(entry.bonus_wager)
        .bind(entry.real_wager)
        .bind(entry.balance_version)
        .bind(c.deposit_amount)
        .bind(c.real_amount_before)
        .bind(c.real_amount_after)
        .bind(c.deposit_wagering_required_before)
        .bind(c.deposit_wagering_required_after)
        .bind(c.bonus_awarded_amount)
        .bind(c.bonus_balance_before)
        .bind(c.bonus_balance_after)
        .bind(c.bonus_wr_remaining_before)
        .bind(c.bonus_wr_remaining_after)
        .bind(entry.game_id)
        .bind(&entry.game_name)
        .bind(entry.jackpot_contribution)
        .bind(entry.vip_points_added)
        .bind(entry.processing_time_ms)
        .bind(&entry.metadata)
        .bind(entry.created_at)
        .execute(&mut *tx)
        .await?;

        session.record_bet(entry.wager_amount, entry.win_amount, entry.created_at);
        sqlx::query(
            "UPDATE game_sessions SET total_wagered = $2, total_won = $3, total_bets = $4,
                rtp_bps = $5, duration_secs = $6, updated_at = $7
             WHERE id = $1",
        )
        .bind(session.id)
        .bind(session.total_wagered)
        .bind(session.total_won)
        .bind(session.total_bets)
        .bind(session.rtp_bps)
        .bind(session.duration_secs)
        .bind(session.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    async fn deposit_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<DepositLogEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT id, user_id, cashier_id, operator_id, game_name, kind, balance_version,
                {CHANGE_COLUMNS}, metadata, bonus_status, expires_at, activated_at, completed_at,
                created_at
             FROM deposit_logs WHERE user_id = $1
             ORDER BY created_at DESC, seq DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit.map(|n| n.max(0)))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(deposit_from_row).collect()
    }

    async fn bet_log(&self, user_id: UserId, limit: Option<i64>) -> LedgerResult<Vec<BetLogEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT id, user_id, game_session_id, operator_id, status, wager_amount, win_amount,
                bonus_wager, real_wager, balance_version, {CHANGE_COLUMNS}, game_id, game_name,
                jackpot_contribution, vip_points_added, processing_time_ms, metadata, created_at
             FROM bet_logs WHERE user_id = $1
             ORDER BY created_at DESC, seq DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit.map(|n| n.max(0)))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(bet_from_row).collect()
    }

    async fn create_session(&self, s: &GameSession) -> LedgerResult<()> {
        sqlx::query(&format!(
            "INSERT INTO game_sessions ({SESSION_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(s.id)
        .bind(s.user_id)
        .bind(s.game_id)
        .bind(&s.game_name)
        .bind(s.operator_id)
        .bind(s.is_bot)
        .bind(s.status.as_str())
        .bind(s.total_wagered)
        .bind(s.total_won)
        .bind(s.total_bets)
        .bind(s.rtp_bps)
        .bind(s.player_starting_balance)
        .bind(s.player_ending_balance)
        .bind(s.duration_secs)
        .bind(s.created_at)
        .bind(s.updated_at)
        .bind(s.closed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> LedgerResult<Option<GameSession>> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM game_sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn close_session(&self, s: &GameSession) -> LedgerResult<()> {
        let result = sqlx::query(
            "UPDATE game_sessions SET status = $2, player_ending_balance = $3,
                duration_secs = $4, updated_at = $5, closed_at = $6
             WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(s.id)
        .bind(s.status.as_str())
        .bind(s.player_ending_balance)
        .bind(s.duration_secs)
        .bind(s.updated_at)
        .bind(s.closed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self
                .get_session(s.id)
                .await?
                .ok_or(LedgerError::SessionNotFound(s.id))?;
            return Err(LedgerError::SessionClosed {
                session_id: current.id,
                status: current.status,
            });
        }
        Ok(())
    }

    async fn create_operator(&self, o: &Operator) -> LedgerResult<()> {
        sqlx::query(&format!(
            "INSERT INTO operators ({OPERATOR_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(o.id)
        .bind(&o.name)
        .bind(o.balance)
        .bind(o.slots_balance)
        .bind(o.arcade_balance)
        .bind(o.current_float)
        .bind(o.is_active)
        .bind(&o.owner_id)
        .bind(&o.updated_by)
        .bind(&o.products)
        .bind(o.version)
        .bind(o.created_at)
        .bind(o.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::OperatorAlreadyExists(o.name.clone())
            } else {
                LedgerError::PersistenceFailure(e)
            }
        })?;
        Ok(())
    }

    async fn get_operator(&self, operator_id: OperatorId) -> LedgerResult<Option<Operator>> {
        let row = sqlx::query(&format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = $1"))
            .bind(operator_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(operator_from_row).transpose()
    }

    async fn list_operators(&self) -> LedgerResult<Vec<Operator>> {
        let rows = sqlx::query(&format!(
            "SELECT {OPERATOR_COLUMNS} FROM operators ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(operator_from_row).collect()
    }

    async fn operator_totals(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals> {
        if self.get_operator(operator_id).await?.is_none() {
            return Err(LedgerError::OperatorNotFound(operator_id));
        }

        let r = sqlx::query(
            "SELECT
                (SELECT COALESCE(SUM(wager_amount), 0)::BIGINT FROM bet_logs WHERE operator_id = $1)
                    AS total_wagered,
                (SELECT COALESCE(SUM(win_amount), 0)::BIGINT FROM bet_logs WHERE operator_id = $1)
                    AS total_won,
                (SELECT COUNT(*) FROM bet_logs WHERE operator_id = $1) AS bet_count,
                (SELECT COUNT(*) FROM game_sessions WHERE operator_id = $1) AS session_count,
                (SELECT COUNT(DISTINCT user_id) FROM (
                    SELECT user_id FROM game_sessions WHERE operator_id = $1
                    UNION
                    SELECT user_id FROM deposit_logs WHERE operator_id = $1
                ) players) AS player_count,
                (SELECT COALESCE(SUM(deposit_amount), 0)::BIGINT FROM deposit_logs
                    WHERE operator_id = $1 AND kind <> 'WITHDRAWAL') AS total_deposited,
                (SELECT COALESCE(SUM(-deposit_amount), 0)::BIGINT FROM deposit_logs
                    WHERE operator_id = $1 AND kind = 'WITHDRAWAL') AS total_withdrawn,
                (SELECT COALESCE(SUM(bonus_awarded_amount), 0)::BIGINT FROM deposit_logs
                    WHERE operator_id = $1 AND kind <> 'WITHDRAWAL') AS total_bonus_granted",
        )
        .bind(operator_id)
        .fetch_one(&self.pool)
        .await?;

        let total_wagered: i64 = r.try_get("total_wagered")?;
        let total_won: i64 = r.try_get("total_won")?;
        Ok(OperatorTotals {
            operator_id,
            total_wagered,
            total_won,
            bet_count: r.try_get("bet_count")?,
            session_count: r.try_get("session_count")?,
            player_count: r.try_get("player_count")?,
            total_deposited: r.try_get("total_deposited")?,
            total_withdrawn: r.try_get("total_withdrawn")?,
            total_bonus_granted: r.try_get("total_bonus_granted")?,
            gross_gaming_revenue: total_wagered.saturating_sub(total_won),
            computed_at: Utc::now(),
        })
    }
}
