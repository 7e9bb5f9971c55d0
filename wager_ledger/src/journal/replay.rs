//! Journal replay and reconciliation against the live balance.

use super::models::{BetLogEntry, DepositLogEntry, JournalEntry};
use crate::ledger::{Amount, Balance, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// An entry whose "before" snapshot does not continue the previous "after"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    pub entry_id: Uuid,
    pub balance_version: i64,
    pub expected_real_before: Amount,
    pub found_real_before: Amount,
    pub expected_bonus_before: Amount,
    pub found_bonus_before: Amount,
}

/// Outcome of replaying a user's journal
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub user_id: UserId,
    pub entries_replayed: usize,
    pub replayed_real: Amount,
    pub replayed_bonus: Amount,
    pub replayed_bonus_wagering: Amount,
    pub actual_real: Amount,
    pub actual_bonus: Amount,
    pub actual_bonus_wagering: Amount,
    /// Versions skipped between consecutive entries
    pub missing_versions: Vec<i64>,
    pub chain_breaks: Vec<ChainBreak>,
    pub checked_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.chain_breaks.is_empty()
            && self.missing_versions.is_empty()
            && self.replayed_real == self.actual_real
            && self.replayed_bonus == self.actual_bonus
            && self.replayed_bonus_wagering == self.actual_bonus_wagering
    }
}

/// Merge both logs into balance-version order
pub fn merge_chronological(
    deposits: Vec<DepositLogEntry>,
    bets: Vec<BetLogEntry>,
) -> Vec<JournalEntry> {
    let mut entries: Vec<JournalEntry> = deposits
        .into_iter()
        .map(JournalEntry::Deposit)
        .chain(bets.into_iter().map(JournalEntry::Bet))
        .collect();
    entries.sort_by_key(|entry| (entry.balance_version(), entry.created_at()));
    entries
}

/// Replay `entries` from a zero balance and compare with `balance`.
///
/// `entries` must already be in balance-version order.
pub fn reconcile(
    user_id: UserId,
    entries: &[JournalEntry],
    balance: &Balance,
) -> ReconciliationReport {
    let mut real: Amount = 0;
    let mut bonus: Amount = 0;
    let mut bonus_wagering: Amount = 0;
    let mut last_version: i64 = 0;
    let mut chain_breaks = Vec::new();
    let mut missing_versions = Vec::new();

    for entry in entries {
        let change = entry.change();
        let version = entry.balance_version();

        missing_versions.extend((last_version + 1)..version);
        last_version = last_version.max(version);

        if change.real_amount_before != real || change.bonus_balance_before != bonus {
            chain_breaks.push(ChainBreak {
                entry_id: entry.id(),
                balance_version: version,
                expected_real_before: real,
                found_real_before: change.real_amount_before,
                expected_bonus_before: bonus,
                found_bonus_before: change.bonus_balance_before,
            });
        }

        real += change.real_delta();
        bonus += change.bonus_delta();
        bonus_wagering = change.bonus_wr_remaining_after;
    }

    // Trailing versions without an entry mean a mutation skipped the journal.
    missing_versions.extend((last_version + 1)..=balance.version);

    if !chain_breaks.is_empty() {
        log::warn!(
            "Journal chain broken for user {} at {} entries",
            user_id,
            chain_breaks.len()
        );
    }

    ReconciliationReport {
        user_id,
        entries_replayed: entries.len(),
        replayed_real: real,
        replayed_bonus: bonus,
        replayed_bonus_wagering: bonus_wagering,
        actual_real: balance.real_balance,
        actual_bonus: balance.bonus_balance,
        actual_bonus_wagering: balance.bonus_wagering_remaining,
        missing_versions,
        chain_breaks,
        checked_at: Utc::now(),
    }
}
