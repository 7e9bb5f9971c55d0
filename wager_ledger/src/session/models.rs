//! Game session and operator models.

use crate::ledger::{Amount, LedgerError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Game session ID type
pub type SessionId = Uuid;

/// Operator (tenant) ID type
pub type OperatorId = Uuid;

/// Operator credited when a request names none
pub const HOUSE_OPERATOR_ID: OperatorId = Uuid::nil();

/// RTP scale: 10_000 basis points is a 100% return
pub const RTP_SCALE: i64 = 10_000;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
    Abandoned,
    Timeout,
    OtpPending,
    Shutdown,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Active,
        SessionStatus::Completed,
        SessionStatus::Expired,
        SessionStatus::Abandoned,
        SessionStatus::Timeout,
        SessionStatus::OtpPending,
        SessionStatus::Shutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Expired => "EXPIRED",
            SessionStatus::Abandoned => "ABANDONED",
            SessionStatus::Timeout => "TIMEOUT",
            SessionStatus::OtpPending => "OTP_PENDING",
            SessionStatus::Shutdown => "SHUTDOWN",
        }
    }

    /// Whether bets may still be placed
    pub fn accepts_bets(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    /// Whether the session may be closed into this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active | SessionStatus::OtpPending)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown session status {s}")))
    }
}

/// One user's play on one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub game_id: Uuid,
    pub game_name: Option<String>,
    pub operator_id: OperatorId,
    pub is_bot: bool,
    pub status: SessionStatus,
    pub total_wagered: Amount,
    pub total_won: Amount,
    pub total_bets: i64,
    /// Return to player in basis points
    pub rtp_bps: i64,
    pub player_starting_balance: Amount,
    pub player_ending_balance: Option<Amount>,
    pub duration_secs: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// Open a session with the player's current playable balance
    pub fn start(
        user_id: UserId,
        request: StartSession,
        starting_balance: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            game_id: request.game_id,
            game_name: request.game_name,
            operator_id: request.operator_id,
            is_bot: request.is_bot,
            status: SessionStatus::Active,
            total_wagered: 0,
            total_won: 0,
            total_bets: 0,
            rtp_bps: 0,
            player_starting_balance: starting_balance,
            player_ending_balance: None,
            duration_secs: 0,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    /// Fold one bet into the running totals
    pub fn record_bet(&mut self, wager: Amount, win: Amount, now: DateTime<Utc>) {
        self.total_wagered = self.total_wagered.saturating_add(wager);
        self.total_won = self.total_won.saturating_add(win);
        self.total_bets += 1;
        self.rtp_bps = rtp_bps(self.total_won, self.total_wagered);
        self.duration_secs = (now - self.created_at).num_seconds().max(0);
        self.updated_at = now;
    }

    /// Move to a terminal status, recording the closing balance
    pub fn close(&mut self, status: SessionStatus, ending_balance: Amount, now: DateTime<Utc>) {
        self.status = status;
        self.player_ending_balance = Some(ending_balance);
        self.duration_secs = (now - self.created_at).num_seconds().max(0);
        self.updated_at = now;
        self.closed_at = Some(now);
    }

    /// RTP as a ratio, `None` before the first wager
    pub fn rtp(&self) -> Option<f64> {
        (self.total_wagered > 0).then(|| self.total_won as f64 / self.total_wagered as f64)
    }
}

/// `won / wagered` in basis points, 0 when nothing was wagered
pub fn rtp_bps(total_won: Amount, total_wagered: Amount) -> i64 {
    if total_wagered <= 0 {
        return 0;
    }
    let scaled = i128::from(total_won) * i128::from(RTP_SCALE) / i128::from(total_wagered);
    i64::try_from(scaled).unwrap_or(i64::MAX)
}

/// Session start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSession {
    pub game_id: Uuid,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default = "house")]
    pub operator_id: OperatorId,
    #[serde(default)]
    pub is_bot: bool,
}

impl StartSession {
    pub fn new(game_id: Uuid, operator_id: OperatorId) -> Self {
        Self {
            game_id,
            game_name: None,
            operator_id,
            is_bot: false,
        }
    }
}

fn house() -> OperatorId {
    HOUSE_OPERATOR_ID
}

/// Tenant owning users, games and float
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: OperatorId,
    pub name: String,
    pub balance: Amount,
    pub slots_balance: Amount,
    pub arcade_balance: Amount,
    pub current_float: Amount,
    pub is_active: bool,
    pub owner_id: String,
    pub updated_by: String,
    pub products: Option<serde_json::Value>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Operator creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOperator {
    pub name: String,
    #[serde(default = "default_operator_balance")]
    pub balance: Amount,
    #[serde(default = "default_operator_balance")]
    pub slots_balance: Amount,
    #[serde(default = "default_operator_balance")]
    pub arcade_balance: Amount,
    #[serde(default)]
    pub products: Option<serde_json::Value>,
}

impl NewOperator {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            balance: default_operator_balance(),
            slots_balance: default_operator_balance(),
            arcade_balance: default_operator_balance(),
            products: None,
        }
    }

    pub fn into_operator(self, now: DateTime<Utc>) -> Operator {
        Operator {
            id: Uuid::new_v4(),
            name: self.name,
            balance: self.balance,
            slots_balance: self.slots_balance,
            arcade_balance: self.arcade_balance,
            current_float: 0,
            is_active: true,
            owner_id: "system".to_string(),
            updated_by: "system".to_string(),
            products: self.products,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_operator_balance() -> Amount {
    100_000
}

/// Reporting rollup across everything an operator hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorTotals {
    pub operator_id: OperatorId,
    pub total_wagered: Amount,
    pub total_won: Amount,
    pub bet_count: i64,
    pub session_count: i64,
    pub player_count: i64,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    pub total_bonus_granted: Amount,
    pub gross_gaming_revenue: Amount,
    pub computed_at: DateTime<Utc>,
}
