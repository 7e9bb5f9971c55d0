//! Pure balance state transitions.
//!
//! Each function takes the current balance and returns the next one plus the
//! snapshot block for the journal entry. Nothing here touches storage, so the
//! same rules hold for every store and are easy to test exhaustively.

use super::{
    errors::{LedgerError, LedgerResult, WithdrawalBlock},
    models::{Amount, Balance, DepositRequest, LedgerPolicy},
    wagering::{WageringEvent, apply_event, is_withdrawal_eligible},
};
use crate::journal::{BalanceChange, DepositKind};
use chrono::{DateTime, Utc};

/// Next balance and the snapshot describing how it was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub balance: Balance,
    pub change: BalanceChange,
}

/// How a wager is funded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagerSplit {
    pub bonus_wager: Amount,
    pub real_wager: Amount,
}

/// Bet transition with its funding split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetTransition {
    pub transition: Transition,
    pub split: WagerSplit,
}

fn checked_add(a: Amount, b: Amount) -> LedgerResult<Amount> {
    a.checked_add(b).ok_or(LedgerError::BalanceOverflow)
}

fn next_version(before: &Balance, now: DateTime<Utc>) -> LedgerResult<Balance> {
    let mut next = before.clone();
    next.version = checked_add(before.version, 1)?;
    next.updated_at = now;
    Ok(next)
}

/// Reject malformed deposit requests
pub fn validate_deposit(request: &DepositRequest) -> LedgerResult<()> {
    if request.kind == DepositKind::Withdrawal {
        return Err(LedgerError::InvalidAmount {
            field: "kind",
            amount: request.amount,
        });
    }
    if request.amount < 0 {
        return Err(LedgerError::InvalidAmount {
            field: "amount",
            amount: request.amount,
        });
    }
    if request.bonus_amount < 0 {
        return Err(LedgerError::InvalidAmount {
            field: "bonus_amount",
            amount: request.bonus_amount,
        });
    }
    if request.kind.is_cash_deposit() && request.amount == 0 {
        return Err(LedgerError::InvalidAmount {
            field: "amount",
            amount: 0,
        });
    }
    if request.amount == 0 && request.bonus_amount == 0 {
        return Err(LedgerError::InvalidAmount {
            field: "amount",
            amount: 0,
        });
    }
    Ok(())
}

/// A bonus expiry must lie in the future, and only bonus grants carry one
pub fn validate_expiry(request: &DepositRequest, now: DateTime<Utc>) -> LedgerResult<()> {
    match request.expires_at {
        Some(expires_at) if request.bonus_amount == 0 || expires_at <= now => {
            Err(LedgerError::InvalidExpiry { expires_at })
        }
        _ => Ok(()),
    }
}

/// Credit a deposit and/or bonus grant
pub fn deposit(
    before: &Balance,
    request: &DepositRequest,
    policy: &LedgerPolicy,
    now: DateTime<Utc>,
) -> LedgerResult<Transition> {
    validate_deposit(request)?;

    let mut next = next_version(before, now)?;
    next.real_balance = checked_add(before.real_balance, request.amount)?;
    next.bonus_balance = checked_add(before.bonus_balance, request.bonus_amount)?;
    next.bonus_wagering_remaining = apply_event(
        WageringEvent::BonusGrant(request.bonus_amount),
        before.bonus_wagering_remaining,
        policy.bonus_wagering_multiplier,
    )?;
    next.deposit_wagering_remaining = apply_event(
        WageringEvent::BonusGrant(request.amount),
        before.deposit_wagering_remaining,
        policy.deposit_wagering_multiplier,
    )?;

    next.total_deposited_real = checked_add(before.total_deposited_real, request.amount)?;
    next.total_bonus_granted = checked_add(before.total_bonus_granted, request.bonus_amount)?;
    if request.kind.is_cash_deposit() {
        next.total_deposited_bonus = checked_add(before.total_deposited_bonus, request.bonus_amount)?;
    }

    let change = BalanceChange::between(before, &next, request.amount, request.bonus_amount);
    Ok(Transition {
        balance: next,
        change,
    })
}

/// Bonus funds are staked first, the remainder comes from real balance
pub fn split_wager(balance: &Balance, wager: Amount) -> WagerSplit {
    let bonus_wager = wager.min(balance.bonus_balance.max(0));
    WagerSplit {
        bonus_wager,
        real_wager: wager - bonus_wager,
    }
}

/// Settle a wager and its win in one step
///
/// # Errors
///
/// * `LedgerError::InvalidAmount` - Wager not positive or negative win
/// * `LedgerError::InsufficientFunds` - Wager exceeds real + bonus
pub fn bet(
    before: &Balance,
    wager: Amount,
    win: Amount,
    now: DateTime<Utc>,
) -> LedgerResult<BetTransition> {
    if wager <= 0 {
        return Err(LedgerError::InvalidAmount {
            field: "wager_amount",
            amount: wager,
        });
    }
    if win < 0 {
        return Err(LedgerError::InvalidAmount {
            field: "win_amount",
            amount: win,
        });
    }
    let available = before.playable();
    if available < wager {
        return Err(LedgerError::InsufficientFunds {
            available,
            required: wager,
        });
    }

    let split = split_wager(before, wager);
    let mut next = next_version(before, now)?;

    next.bonus_balance = before.bonus_balance - split.bonus_wager;
    next.real_balance = checked_add(before.real_balance - split.real_wager, win)?;

    // Multiplier is irrelevant for wagers
    next.bonus_wagering_remaining =
        apply_event(WageringEvent::Wager(wager), before.bonus_wagering_remaining, 0)?;
    next.deposit_wagering_remaining =
        apply_event(WageringEvent::Wager(wager), before.deposit_wagering_remaining, 0)?;

    next.total_wagered = checked_add(before.total_wagered, wager)?;
    next.total_won = checked_add(before.total_won, win)?;

    let change = BalanceChange::between(before, &next, 0, 0);
    Ok(BetTransition {
        transition: Transition {
            balance: next,
            change,
        },
        split,
    })
}

/// Pay out real balance
///
/// # Errors
///
/// * `LedgerError::InvalidAmount` - Amount not positive
/// * `LedgerError::WithdrawalBlocked` - Wagering outstanding or amount exceeds real balance
pub fn withdrawal(before: &Balance, amount: Amount, now: DateTime<Utc>) -> LedgerResult<Transition> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount {
            field: "amount",
            amount,
        });
    }
    if !is_withdrawal_eligible(before) {
        return Err(LedgerError::WithdrawalBlocked(
            WithdrawalBlock::WageringOutstanding {
                remaining: before.bonus_wagering_remaining,
            },
        ));
    }
    if amount > before.real_balance {
        return Err(LedgerError::WithdrawalBlocked(WithdrawalBlock::ExceedsBalance {
            available: before.real_balance,
            requested: amount,
        }));
    }

    let mut next = next_version(before, now)?;
    next.real_balance = before.real_balance - amount;
    next.total_withdrawn = checked_add(before.total_withdrawn, amount)?;

    let change = BalanceChange::between(before, &next, -amount, 0);
    Ok(Transition {
        balance: next,
        change,
    })
}
