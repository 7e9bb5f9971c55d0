//! Ledger data models.

use crate::{
    journal::{BetLogEntry, DepositKind},
    session::{GameSession, HOUSE_OPERATOR_ID, OperatorId, SessionId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User ID type
pub type UserId = i64;

/// Monetary amount in minor currency units
pub type Amount = i64;

/// Local user record linked to the external auth identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub auth_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub auth_id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Spendable balances and wagering counters for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub real_balance: Amount,
    pub bonus_balance: Amount,
    pub free_spins_remaining: i64,
    pub deposit_wagering_remaining: Amount,
    pub bonus_wagering_remaining: Amount,

    pub total_deposited_real: Amount,
    pub total_deposited_bonus: Amount,
    pub total_withdrawn: Amount,
    pub total_wagered: Amount,
    pub total_won: Amount,
    pub total_bonus_granted: Amount,
    pub total_free_spin_wins: Amount,

    /// Optimistic concurrency token, incremented by every mutation
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    /// Zero balance for a freshly created user
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            real_balance: 0,
            bonus_balance: 0,
            free_spins_remaining: 0,
            deposit_wagering_remaining: 0,
            bonus_wagering_remaining: 0,
            total_deposited_real: 0,
            total_deposited_bonus: 0,
            total_withdrawn: 0,
            total_wagered: 0,
            total_won: 0,
            total_bonus_granted: 0,
            total_free_spin_wins: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Real plus bonus balance, the most a single bet may stake
    pub fn playable(&self) -> Amount {
        self.real_balance.saturating_add(self.bonus_balance)
    }
}

/// Tunable accounting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    /// Playthrough required per unit of bonus granted
    pub bonus_wagering_multiplier: i64,

    /// Playthrough required per unit of real money deposited
    pub deposit_wagering_multiplier: i64,

    /// Automatic retries after a lost-update conflict
    pub max_conflict_retries: u32,
}

impl LedgerPolicy {
    /// Create policy from environment variables
    ///
    /// - `BONUS_WAGERING_MULTIPLIER` (default: 30)
    /// - `DEPOSIT_WAGERING_MULTIPLIER` (default: 0)
    /// - `LEDGER_MAX_CONFLICT_RETRIES` (default: 3)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bonus_wagering_multiplier: std::env::var("BONUS_WAGERING_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bonus_wagering_multiplier),
            deposit_wagering_multiplier: std::env::var("DEPOSIT_WAGERING_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.deposit_wagering_multiplier),
            max_conflict_retries: std::env::var("LEDGER_MAX_CONFLICT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_conflict_retries),
        }
    }
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            bonus_wagering_multiplier: 30,
            deposit_wagering_multiplier: 0,
            max_conflict_retries: 3,
        }
    }
}

/// Deposit or bonus grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    #[serde(default = "default_deposit_kind")]
    pub kind: DepositKind,
    pub amount: Amount,
    #[serde(default)]
    pub bonus_amount: Amount,
    #[serde(default)]
    pub cashier_id: Option<UserId>,
    #[serde(default = "default_operator")]
    pub operator_id: OperatorId,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl DepositRequest {
    /// Plain cash deposit with an optional bonus, credited to the house operator
    pub fn cash(amount: Amount, bonus_amount: Amount) -> Self {
        Self {
            kind: DepositKind::DepositCashapp,
            amount,
            bonus_amount,
            cashier_id: None,
            operator_id: HOUSE_OPERATOR_ID,
            game_name: None,
            expires_at: None,
            metadata: None,
        }
    }

    /// Bonus-only grant of the given kind
    pub fn bonus(kind: DepositKind, bonus_amount: Amount) -> Self {
        Self {
            kind,
            amount: 0,
            bonus_amount,
            ..Self::cash(0, 0)
        }
    }

    pub fn with_operator(mut self, operator_id: OperatorId) -> Self {
        self.operator_id = operator_id;
        self
    }
}

fn default_deposit_kind() -> DepositKind {
    DepositKind::DepositCashapp
}

fn default_operator() -> OperatorId {
    HOUSE_OPERATOR_ID
}

/// Single wager inside a game session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub session_id: SessionId,
    pub wager_amount: Amount,
    #[serde(default)]
    pub jackpot_contribution: Option<Amount>,
    #[serde(default)]
    pub vip_points: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl BetRequest {
    pub fn new(session_id: SessionId, wager_amount: Amount) -> Self {
        Self {
            session_id,
            wager_amount,
            jackpot_contribution: None,
            vip_points: None,
            metadata: None,
        }
    }
}

/// Result of an applied bet
#[derive(Debug, Clone, Serialize)]
pub struct BetOutcome {
    pub balance: Balance,
    pub win_amount: Amount,
    pub bonus_wager: Amount,
    pub real_wager: Amount,
    pub entry: BetLogEntry,
    pub session: GameSession,
}

/// Cash-out of real balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub amount: Amount,
    #[serde(default)]
    pub cashier_id: Option<UserId>,
    #[serde(default = "default_operator")]
    pub operator_id: OperatorId,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl WithdrawalRequest {
    pub fn new(amount: Amount) -> Self {
        Self {
            amount,
            cashier_id: None,
            operator_id: HOUSE_OPERATOR_ID,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_thirty_times_playthrough() {
        let policy = LedgerPolicy::default();
        assert_eq!(policy.bonus_wagering_multiplier, 30);
        assert_eq!(policy.deposit_wagering_multiplier, 0);
    }

    #[test]
    fn test_deposit_request_defaults_from_json() {
        let request: DepositRequest =
            serde_json::from_str(r#"{"amount": 5000, "bonus_amount": 2500}"#).unwrap();
        assert_eq!(request.kind, DepositKind::DepositCashapp);
        assert_eq!(request.operator_id, HOUSE_OPERATOR_ID);
        assert!(request.cashier_id.is_none());
    }

    #[test]
    fn test_playable_sums_real_and_bonus() {
        let mut balance = Balance::empty(1, Utc::now());
        balance.real_balance = 300;
        balance.bonus_balance = 200;
        assert_eq!(balance.playable(), 500);
    }
}
