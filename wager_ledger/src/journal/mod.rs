//! Append-only transaction journal.
//!
//! Every balance mutation produces exactly one entry carrying before/after
//! snapshots of the real balance, bonus balance and wagering counters:
//!
//! - [`DepositLogEntry`]: cash deposits, bonus grants and withdrawals
//! - [`BetLogEntry`]: one wager and its payout
//!
//! Entries are written by the store in the same transaction as the balance
//! row they describe, and are never updated or deleted. [`reconcile`] replays
//! a user's journal and checks it against the live balance.

pub mod models;
pub mod replay;

pub use models::{
    BalanceChange, BetLogEntry, BetStatus, BonusStatus, DepositKind, DepositLogEntry, JournalEntry,
};
pub use replay::{ChainBreak, ReconciliationReport, merge_chronological, reconcile};
