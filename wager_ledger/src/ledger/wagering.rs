//! Wagering-requirement tracking.
//!
//! A bonus grant adds `amount × multiplier` of required playthrough. Every
//! wager, whether staked from real or bonus funds, pays it down. The counter
//! never goes below zero.

use super::{
    errors::{LedgerError, LedgerResult},
    models::{Amount, Balance},
};

/// Something that moves a wagering requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WageringEvent {
    /// Bonus credited to the account
    BonusGrant(Amount),

    /// Stake placed on a game
    Wager(Amount),
}

/// Signed change to `remaining` caused by `event`
///
/// # Arguments
///
/// * `event` - Grant or wager
/// * `remaining` - Requirement before the event
/// * `multiplier` - Playthrough multiple applied to grants
///
/// # Errors
///
/// * `LedgerError::BalanceOverflow` - Grant × multiplier does not fit
pub fn requirement_delta(
    event: WageringEvent,
    remaining: Amount,
    multiplier: i64,
) -> LedgerResult<i64> {
    match event {
        WageringEvent::BonusGrant(amount) => amount
            .checked_mul(multiplier)
            .ok_or(LedgerError::BalanceOverflow),
        WageringEvent::Wager(amount) => Ok(-amount.clamp(0, remaining.max(0))),
    }
}

/// Requirement after `event`
pub fn apply_event(event: WageringEvent, remaining: Amount, multiplier: i64) -> LedgerResult<Amount> {
    let delta = requirement_delta(event, remaining, multiplier)?;
    remaining
        .checked_add(delta)
        .map(|next| next.max(0))
        .ok_or(LedgerError::BalanceOverflow)
}

/// Withdrawals require the bonus playthrough to be complete
pub fn is_withdrawal_eligible(balance: &Balance) -> bool {
    balance.bonus_wagering_remaining == 0
}
