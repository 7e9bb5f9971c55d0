//! # Wager Ledger
//!
//! A balance and wagering-requirement ledger for a multi-tenant casino.
//!
//! Each user has a real-money balance, a bonus balance and a bonus
//! playthrough requirement. Deposits, bets and withdrawals are applied as
//! atomic, versioned state transitions, and every one of them appends an
//! immutable journal entry carrying before/after snapshots.
//!
//! ## Core Modules
//!
//! - [`ledger`]: The [`Ledger`] service, balance transitions and wagering rules
//! - [`journal`]: Deposit/bonus and bet log entries, replay and reconciliation
//! - [`session`]: Game sessions, operators and operator rollups
//! - [`outcome`]: Payout generators consulted for each wager
//! - [`identity`]: Bearer token verification into a [`identity::VerifiedIdentity`]
//! - [`db`]: The [`db::LedgerStore`] trait with PostgreSQL and in-memory stores
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use wager_ledger::{
//!     DepositRequest, Ledger, LedgerPolicy, db::InMemoryLedgerStore, identity::VerifiedIdentity,
//!     outcome::FixedOutcome,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::new(
//!     Arc::new(InMemoryLedgerStore::new()),
//!     Arc::new(FixedOutcome(0)),
//!     LedgerPolicy::default(),
//! );
//!
//! let identity = VerifiedIdentity::new("auth-1", "player@example.com", None)?;
//! let user = ledger.open_account(&identity).await?;
//! let balance = ledger.apply_deposit(user.id, DepositRequest::cash(5000, 2500)).await?;
//!
//! assert_eq!(balance.bonus_wagering_remaining, 75_000);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod identity;
pub mod journal;
pub mod ledger;
pub mod outcome;
pub mod session;

pub use ledger::{
    Amount, Balance, BetOutcome, BetRequest, DepositRequest, Ledger, LedgerError, LedgerPolicy,
    LedgerResult, User, UserId, WithdrawalRequest,
};
