//! Balance ledger.
//!
//! [`Ledger`] owns every user's real balance, bonus balance and wagering
//! counters. Deposits, bets and withdrawals are computed as pure
//! [`transitions`] and committed through a [`crate::db::LedgerStore`]
//! together with their journal entry.

pub mod errors;
pub mod locks;
pub mod manager;
pub mod models;
pub mod transitions;
pub mod wagering;

pub use errors::{LedgerError, LedgerResult, WithdrawalBlock};
pub use locks::UserLocks;
pub use manager::Ledger;
pub use models::{
    Amount, Balance, BetOutcome, BetRequest, DepositRequest, LedgerPolicy, NewUser, User, UserId,
    WithdrawalRequest,
};
pub use wagering::{WageringEvent, is_withdrawal_eligible};
