/// Property-based tests for the ledger invariants using proptest
///
/// Random sequences of deposits, bets and withdrawals are applied and the
/// accounting invariants checked after every step.
use proptest::prelude::*;
use std::sync::Arc;
use uuid::Uuid;
use wager_ledger::{
    Balance, BetRequest, DepositRequest, Ledger, LedgerError, LedgerPolicy, WithdrawalRequest,
    db::InMemoryLedgerStore,
    identity::VerifiedIdentity,
    journal::BalanceChange,
    ledger::{WithdrawalBlock, transitions},
    outcome::MultiplierOutcome,
    session::{HOUSE_OPERATOR_ID, StartSession},
};

#[derive(Debug, Clone)]
enum Op {
    Deposit { amount: i64, bonus: i64 },
    Bet { wager: i64, win: i64 },
    Withdraw { amount: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..5_000, 0i64..2_000).prop_map(|(amount, bonus)| Op::Deposit { amount, bonus }),
        (1i64..3_000, 0i64..6_000).prop_map(|(wager, win)| Op::Bet { wager, win }),
        (1i64..5_000).prop_map(|amount| Op::Withdraw { amount }),
    ]
}

fn assert_non_negative(balance: &Balance) -> Result<(), TestCaseError> {
    prop_assert!(balance.real_balance >= 0, "real balance went negative");
    prop_assert!(balance.bonus_balance >= 0, "bonus balance went negative");
    prop_assert!(balance.bonus_wagering_remaining >= 0);
    prop_assert!(balance.deposit_wagering_remaining >= 0);
    Ok(())
}

proptest! {
    #[test]
    fn test_transitions_preserve_invariants(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let policy = LedgerPolicy::default();
        let now = chrono::Utc::now();
        let mut balance = Balance::empty(1, now);
        let mut changes: Vec<BalanceChange> = Vec::new();

        for op in ops {
            match op {
                Op::Deposit { amount, bonus } => {
                    let t = transitions::deposit(&balance, &DepositRequest::cash(amount, bonus), &policy, now).unwrap();
                    prop_assert_eq!(
                        t.balance.bonus_wagering_remaining,
                        balance.bonus_wagering_remaining + bonus * policy.bonus_wagering_multiplier
                    );
                    changes.push(t.change);
                    balance = t.balance;
                }
                Op::Bet { wager, win } => match transitions::bet(&balance, wager, win, now) {
                    Ok(bet) => {
                        prop_assert_eq!(bet.split.bonus_wager + bet.split.real_wager, wager);
                        prop_assert!(bet.split.bonus_wager <= balance.bonus_balance);
                        prop_assert!(bet.split.real_wager >= 0);

                        let next = &bet.transition.balance;
                        prop_assert!(next.bonus_wagering_remaining <= balance.bonus_wagering_remaining);
                        prop_assert_eq!(
                            next.bonus_wagering_remaining,
                            (balance.bonus_wagering_remaining - wager).max(0)
                        );
                        prop_assert_eq!(next.total_wagered, balance.total_wagered + wager);
                        changes.push(bet.transition.change);
                        balance = bet.transition.balance;
                    }
                    Err(LedgerError::InsufficientFunds { available, required }) => {
                        prop_assert_eq!(available, balance.playable());
                        prop_assert!(required > available);
                    }
                    Err(e) => prop_assert!(false, "unexpected bet error {e}"),
                },
                Op::Withdraw { amount } => match transitions::withdrawal(&balance, amount, now) {
                    Ok(t) => {
                        prop_assert_eq!(balance.bonus_wagering_remaining, 0);
                        prop_assert!(amount <= balance.real_balance);
                        changes.push(t.change);
                        balance = t.balance;
                    }
                    Err(LedgerError::WithdrawalBlocked(WithdrawalBlock::WageringOutstanding { remaining })) => {
                        prop_assert!(remaining > 0);
                        prop_assert_eq!(remaining, balance.bonus_wagering_remaining);
                    }
                    Err(LedgerError::WithdrawalBlocked(WithdrawalBlock::ExceedsBalance { available, requested })) => {
                        prop_assert_eq!(balance.bonus_wagering_remaining, 0);
                        prop_assert!(requested > available);
                    }
                    Err(e) => prop_assert!(false, "unexpected withdrawal error {e}"),
                },
            }
            assert_non_negative(&balance)?;
        }

        // Snapshot chain is unbroken and its deltas rebuild the balance
        for pair in changes.windows(2) {
            prop_assert_eq!(pair[0].real_amount_after, pair[1].real_amount_before);
            prop_assert_eq!(pair[0].bonus_balance_after, pair[1].bonus_balance_before);
        }
        let real: i64 = changes.iter().map(BalanceChange::real_delta).sum();
        let bonus: i64 = changes.iter().map(BalanceChange::bonus_delta).sum();
        prop_assert_eq!(real, balance.real_balance);
        prop_assert_eq!(bonus, balance.bonus_balance);
        prop_assert_eq!(balance.version, changes.len() as i64);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_ledger_journal_reconciles(
        ops in prop::collection::vec(op_strategy(), 1..30),
        multiplier in 0i64..3,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let ledger = Ledger::new(
                Arc::new(InMemoryLedgerStore::new()),
                Arc::new(MultiplierOutcome(multiplier)),
                LedgerPolicy::default(),
            );
            let identity = VerifiedIdentity::new("auth-prop", "prop@example.com", None).unwrap();
            let user = ledger.open_account(&identity).await.unwrap();
            let session = ledger
                .start_session(user.id, StartSession::new(Uuid::new_v4(), HOUSE_OPERATOR_ID))
                .await
                .unwrap();

            for op in ops {
                let _ = match op {
                    Op::Deposit { amount, bonus } => ledger
                        .apply_deposit(user.id, DepositRequest::cash(amount, bonus))
                        .await
                        .map(|_| ()),
                    Op::Bet { wager, .. } => ledger
                        .apply_bet(user.id, BetRequest::new(session.id, wager))
                        .await
                        .map(|_| ()),
                    Op::Withdraw { amount } => ledger
                        .apply_withdrawal(user.id, WithdrawalRequest::new(amount))
                        .await
                        .map(|_| ()),
                };
            }

            let balance = ledger.balance(user.id).await.unwrap();
            assert_non_negative(&balance)?;

            let report = ledger.reconcile(user.id).await.unwrap();
            prop_assert!(report.is_consistent(), "{:?}", report);
            prop_assert_eq!(report.entries_replayed as i64, balance.version);

            let session = ledger.session(session.id).await.unwrap();
            prop_assert_eq!(session.total_wagered, balance.total_wagered);
            prop_assert_eq!(session.total_won, balance.total_won);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
