//! Journal entry models.

use crate::{
    ledger::{Amount, Balance, LedgerError, UserId},
    session::{OperatorId, SessionId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Kind of grant recorded in the deposit/bonus log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositKind {
    #[serde(rename = "DEPOSIT_CASHAPP")]
    DepositCashapp,
    #[serde(rename = "DEPOSIT_INSTORE_CASH")]
    DepositInstoreCash,
    #[serde(rename = "DEPOSIT_INSTORE_CARD")]
    DepositInstoreCard,
    #[serde(rename = "DEPOSIT_MATCH")]
    DepositMatch,
    #[serde(rename = "LONG_BONUS_DAY_1")]
    LongBonusDay1,
    #[serde(rename = "LONG_BONUS_DAY_2")]
    LongBonusDay2,
    #[serde(rename = "VIP_LEVEL_UP")]
    VipLevelUp,
    #[serde(rename = "WITHDRAWAL")]
    Withdrawal,
}

impl DepositKind {
    pub const ALL: [DepositKind; 8] = [
        DepositKind::DepositCashapp,
        DepositKind::DepositInstoreCash,
        DepositKind::DepositInstoreCard,
        DepositKind::DepositMatch,
        DepositKind::LongBonusDay1,
        DepositKind::LongBonusDay2,
        DepositKind::VipLevelUp,
        DepositKind::Withdrawal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DepositKind::DepositCashapp => "DEPOSIT_CASHAPP",
            DepositKind::DepositInstoreCash => "DEPOSIT_INSTORE_CASH",
            DepositKind::DepositInstoreCard => "DEPOSIT_INSTORE_CARD",
            DepositKind::DepositMatch => "DEPOSIT_MATCH",
            DepositKind::LongBonusDay1 => "LONG_BONUS_DAY_1",
            DepositKind::LongBonusDay2 => "LONG_BONUS_DAY_2",
            DepositKind::VipLevelUp => "VIP_LEVEL_UP",
            DepositKind::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Kinds that move real money into the account
    pub fn is_cash_deposit(&self) -> bool {
        matches!(
            self,
            DepositKind::DepositCashapp
                | DepositKind::DepositInstoreCash
                | DepositKind::DepositInstoreCard
        )
    }
}

impl fmt::Display for DepositKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DepositKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown deposit kind {s}")))
    }
}

/// Final status of a wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Nsf,
    GameCheckFailed,
    Completed,
    CancelledByUser,
    CancelledBySystem,
    ServerShutdown,
    Expired,
}

impl BetStatus {
    pub const ALL: [BetStatus; 7] = [
        BetStatus::Nsf,
        BetStatus::GameCheckFailed,
        BetStatus::Completed,
        BetStatus::CancelledByUser,
        BetStatus::CancelledBySystem,
        BetStatus::ServerShutdown,
        BetStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Nsf => "NSF",
            BetStatus::GameCheckFailed => "GAME_CHECK_FAILED",
            BetStatus::Completed => "COMPLETED",
            BetStatus::CancelledByUser => "CANCELLED_BY_USER",
            BetStatus::CancelledBySystem => "CANCELLED_BY_SYSTEM",
            BetStatus::ServerShutdown => "SERVER_SHUTDOWN",
            BetStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BetStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown bet status {s}")))
    }
}

/// Lifecycle of a bonus grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BonusStatus {
    Pending,
    Active,
    Completed,
    Expired,
    Cancelled,
}

impl BonusStatus {
    pub const ALL: [BonusStatus; 5] = [
        BonusStatus::Pending,
        BonusStatus::Active,
        BonusStatus::Completed,
        BonusStatus::Expired,
        BonusStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BonusStatus::Pending => "PENDING",
            BonusStatus::Active => "ACTIVE",
            BonusStatus::Completed => "COMPLETED",
            BonusStatus::Expired => "EXPIRED",
            BonusStatus::Cancelled => "CANCELLED",
        }
    }

    /// Status recorded when a grant is credited
    pub fn on_grant(bonus_amount: Amount) -> Option<BonusStatus> {
        (bonus_amount > 0).then_some(BonusStatus::Active)
    }
}

impl fmt::Display for BonusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BonusStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BonusStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LedgerError::CorruptRecord(format!("unknown bonus status {s}")))
    }
}

/// Before/after snapshot carried by every journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Signed real-balance delta from a grant or withdrawal, zero for bets
    pub deposit_amount: Amount,
    pub real_amount_before: Amount,
    pub real_amount_after: Amount,
    pub deposit_wagering_required_before: Amount,
    pub deposit_wagering_required_after: Amount,

    pub bonus_awarded_amount: Amount,
    pub bonus_balance_before: Amount,
    pub bonus_balance_after: Amount,
    pub bonus_wr_remaining_before: Amount,
    pub bonus_wr_remaining_after: Amount,
}

impl BalanceChange {
    /// Snapshot the difference between two balance states
    pub fn between(
        before: &Balance,
        after: &Balance,
        deposit_amount: Amount,
        bonus_awarded: Amount,
    ) -> Self {
        Self {
            deposit_amount,
            real_amount_before: before.real_balance,
            real_amount_after: after.real_balance,
            deposit_wagering_required_before: before.deposit_wagering_remaining,
            deposit_wagering_required_after: after.deposit_wagering_remaining,
            bonus_awarded_amount: bonus_awarded,
            bonus_balance_before: before.bonus_balance,
            bonus_balance_after: after.bonus_balance,
            bonus_wr_remaining_before: before.bonus_wagering_remaining,
            bonus_wr_remaining_after: after.bonus_wagering_remaining,
        }
    }

    pub fn real_delta(&self) -> Amount {
        self.real_amount_after - self.real_amount_before
    }

    pub fn bonus_delta(&self) -> Amount {
        self.bonus_balance_after - self.bonus_balance_before
    }
}

/// Immutable deposit, bonus grant or withdrawal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub cashier_id: Option<UserId>,
    pub operator_id: OperatorId,
    pub game_name: Option<String>,
    pub kind: DepositKind,
    /// Balance version produced by this entry; orders a user's journal
    pub balance_version: i64,
    #[serde(flatten)]
    pub change: BalanceChange,
    pub metadata: Option<serde_json::Value>,
    /// Set only on entries that award a bonus
    #[serde(default)]
    pub bonus_status: Option<BonusStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one wager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetLogEntry {
    pub id: Uuid,
    pub user_id: UserId,
    pub game_session_id: SessionId,
    pub operator_id: OperatorId,
    pub status: BetStatus,
    pub wager_amount: Amount,
    pub win_amount: Amount,
    pub bonus_wager: Amount,
    pub real_wager: Amount,
    pub balance_version: i64,
    #[serde(flatten)]
    pub change: BalanceChange,
    pub game_id: Uuid,
    pub game_name: Option<String>,
    pub jackpot_contribution: Option<Amount>,
    pub vip_points_added: Option<i64>,
    pub processing_time_ms: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl BetLogEntry {
    /// A hit pays out more than was staked
    pub fn is_hit(&self) -> bool {
        self.win_amount > self.wager_amount
    }
}

/// Either kind of journal entry, for merged chronological views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEntry {
    Deposit(DepositLogEntry),
    Bet(BetLogEntry),
}

impl JournalEntry {
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            JournalEntry::Deposit(entry) => entry.created_at,
            JournalEntry::Bet(entry) => entry.created_at,
        }
    }

    pub fn balance_version(&self) -> i64 {
        match self {
            JournalEntry::Deposit(entry) => entry.balance_version,
            JournalEntry::Bet(entry) => entry.balance_version,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            JournalEntry::Deposit(entry) => entry.id,
            JournalEntry::Bet(entry) => entry.id,
        }
    }

    pub fn change(&self) -> &BalanceChange {
        match self {
            JournalEntry::Deposit(entry) => &entry.change,
            JournalEntry::Bet(entry) => &entry.change,
        }
    }
}
