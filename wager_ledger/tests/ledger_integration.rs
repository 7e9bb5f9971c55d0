//! Integration tests for the ledger against the in-memory store.
//!
//! Covers the deposit/bet/withdrawal lifecycle, wagering gates, game session
//! bookkeeping, journal reconciliation and operator rollups.

use std::sync::Arc;
use uuid::Uuid;
use wager_ledger::{
    BetRequest, DepositRequest, Ledger, LedgerError, LedgerPolicy, WithdrawalRequest,
    db::{InMemoryLedgerStore, LedgerStore},
    identity::VerifiedIdentity,
    journal::{BonusStatus, DepositKind, JournalEntry},
    ledger::WithdrawalBlock,
    outcome::{FixedOutcome, MultiplierOutcome, OutcomeGenerator},
    session::{
        GameSession, HOUSE_OPERATOR_ID, NewOperator, OperatorAggregator, SessionStatus,
        StartSession,
    },
};

fn ledger_with(outcomes: impl OutcomeGenerator + 'static) -> (Ledger, Arc<dyn LedgerStore>) {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let ledger = Ledger::new(store.clone(), Arc::new(outcomes), LedgerPolicy::default());
    (ledger, store)
}

fn identity(tag: &str) -> VerifiedIdentity {
    VerifiedIdentity::new(
        format!("auth-{tag}"),
        format!("{tag}@example.com"),
        Some(tag.to_string()),
    )
    .unwrap()
}

async fn start(ledger: &Ledger, user_id: i64) -> GameSession {
    ledger
        .start_session(user_id, StartSession::new(Uuid::new_v4(), HOUSE_OPERATOR_ID))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_deposit_bet_withdrawal_scenario() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("alice")).await.unwrap();

    let balance = ledger
        .apply_deposit(user.id, DepositRequest::cash(5000, 2500))
        .await
        .unwrap();
    assert_eq!(balance.real_balance, 5000);
    assert_eq!(balance.bonus_balance, 2500);
    assert_eq!(balance.bonus_wagering_remaining, 75_000);

    let session = start(&ledger, user.id).await;
    assert_eq!(session.player_starting_balance, 7500);

    let outcome = ledger
        .apply_bet(user.id, BetRequest::new(session.id, 1000))
        .await
        .unwrap();
    assert_eq!(outcome.bonus_wager, 1000);
    assert_eq!(outcome.real_wager, 0);
    assert_eq!(outcome.win_amount, 0);
    assert_eq!(outcome.balance.real_balance, 5000);
    assert_eq!(outcome.balance.bonus_balance, 1500);
    assert_eq!(outcome.balance.bonus_wagering_remaining, 74_000);
    assert_eq!(outcome.entry.change.bonus_balance_before, 2500);
    assert_eq!(outcome.entry.change.bonus_balance_after, 1500);
    assert_eq!(outcome.session.total_bets, 1);

    let err = ledger
        .apply_withdrawal(user.id, WithdrawalRequest::new(1000))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::WithdrawalBlocked(WithdrawalBlock::WageringOutstanding { remaining: 74_000 })
    ));

    // Blocked withdrawal leaves no trace
    let balance = ledger.balance(user.id).await.unwrap();
    assert_eq!(balance.version, 2);
    assert_eq!(ledger.deposit_log(user.id, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_open_account_is_idempotent() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let first = ledger.open_account(&identity("bob")).await.unwrap();
    let second = ledger.open_account(&identity("bob")).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.display_name.as_deref(), Some("bob"));

    let balance = ledger.balance(first.id).await.unwrap();
    assert_eq!(balance.real_balance, 0);
    assert_eq!(balance.version, 0);
}

#[tokio::test]
async fn test_email_taken_by_another_identity_is_a_conflict() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    ledger.open_account(&identity("cleo")).await.unwrap();

    let second_login = VerifiedIdentity::new("auth-cleo-2", "cleo@example.com", None).unwrap();
    let result = ledger.open_account(&second_login).await;
    match result {
        Err(LedgerError::IdentityConflict { email }) => assert_eq!(email, "cleo@example.com"),
        other => panic!("expected identity conflict, got {other:?}"),
    }

    // The original identity still resolves to its account
    assert!(ledger.open_account(&identity("cleo")).await.is_ok());
}

#[tokio::test]
async fn test_update_display_name_trims_and_clears() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("carol")).await.unwrap();

    let renamed = ledger
        .update_display_name(user.id, Some("  Carol K  ".to_string()))
        .await
        .unwrap();
    assert_eq!(renamed.display_name.as_deref(), Some("Carol K"));

    let cleared = ledger
        .update_display_name(user.id, Some("   ".to_string()))
        .await
        .unwrap();
    assert_eq!(cleared.display_name, None);
    assert_eq!(cleared.email, "carol@example.com");
}

#[tokio::test]
async fn test_insufficient_funds_records_nothing() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("dave")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(100, 50))
        .await
        .unwrap();
    let session = start(&ledger, user.id).await;

    let err = ledger
        .apply_bet(user.id, BetRequest::new(session.id, 151))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            available: 150,
            required: 151
        }
    ));

    assert_eq!(ledger.balance(user.id).await.unwrap().version, 1);
    assert!(ledger.bet_log(user.id, None).await.unwrap().is_empty());
    assert_eq!(ledger.session(session.id).await.unwrap().total_bets, 0);
}

#[tokio::test]
async fn test_wagering_completion_unlocks_withdrawal() {
    let (ledger, _) = ledger_with(MultiplierOutcome(1));
    let user = ledger.open_account(&identity("erin")).await.unwrap();
    ledger
        .apply_deposit(
            user.id,
            DepositRequest::bonus(DepositKind::LongBonusDay1, 10),
        )
        .await
        .unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();

    let session = start(&ledger, user.id).await;
    // 10 bonus × 30 = 300 playthrough; each even-money bet pays the wager back as real
    for _ in 0..3 {
        ledger
            .apply_bet(user.id, BetRequest::new(session.id, 100))
            .await
            .unwrap();
    }

    let balance = ledger.balance(user.id).await.unwrap();
    assert_eq!(balance.bonus_wagering_remaining, 0);
    assert_eq!(balance.bonus_balance, 0);
    assert_eq!(balance.real_balance, 1010);

    let after = ledger
        .apply_withdrawal(user.id, WithdrawalRequest::new(1010))
        .await
        .unwrap();
    assert_eq!(after.real_balance, 0);
    assert_eq!(after.total_withdrawn, 1010);

    let log = ledger.deposit_log(user.id, Some(1)).await.unwrap();
    assert_eq!(log[0].kind, DepositKind::Withdrawal);
    assert_eq!(log[0].change.deposit_amount, -1010);

    let report = ledger.reconcile(user.id).await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
    assert_eq!(report.entries_replayed, 6);
    assert_eq!(report.replayed_real, 0);
}

#[tokio::test]
async fn test_withdrawal_cannot_exceed_real_balance() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("frank")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(500, 0))
        .await
        .unwrap();

    let err = ledger
        .apply_withdrawal(user.id, WithdrawalRequest::new(501))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::WithdrawalBlocked(WithdrawalBlock::ExceedsBalance {
            available: 500,
            requested: 501
        })
    ));

    assert!(matches!(
        ledger
            .apply_withdrawal(user.id, WithdrawalRequest::new(0))
            .await,
        Err(LedgerError::InvalidAmount { .. })
    ));
}

#[tokio::test]
async fn test_session_totals_and_rtp_track_bets() {
    let (ledger, _) = ledger_with(MultiplierOutcome(2));
    let user = ledger.open_account(&identity("gina")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();
    let session = start(&ledger, user.id).await;

    for wager in [100, 50] {
        ledger
            .apply_bet(user.id, BetRequest::new(session.id, wager))
            .await
            .unwrap();
    }

    let session = ledger.session(session.id).await.unwrap();
    assert_eq!(session.total_wagered, 150);
    assert_eq!(session.total_won, 300);
    assert_eq!(session.total_bets, 2);
    assert_eq!(session.rtp_bps, 20_000);

    let bets = ledger.bet_log(user.id, None).await.unwrap();
    assert_eq!(bets.len(), 2);
    assert_eq!(bets[0].wager_amount, 50);
    assert!(bets.iter().all(|b| b.is_hit()));
    assert!(bets.iter().all(|b| b.processing_time_ms.is_some()));
}

#[tokio::test]
async fn test_closed_sessions_reject_bets() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("hank")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();
    let session = start(&ledger, user.id).await;

    assert!(matches!(
        ledger
            .close_session(user.id, session.id, SessionStatus::Active)
            .await,
        Err(LedgerError::InvalidSessionTransition(SessionStatus::Active))
    ));

    let closed = ledger
        .close_session(user.id, session.id, SessionStatus::Completed)
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Completed);
    assert_eq!(closed.player_ending_balance, Some(1000));
    assert!(closed.closed_at.is_some());

    assert!(matches!(
        ledger
            .close_session(user.id, session.id, SessionStatus::Abandoned)
            .await,
        Err(LedgerError::SessionClosed { .. })
    ));
    assert!(matches!(
        ledger
            .apply_bet(user.id, BetRequest::new(session.id, 10))
            .await,
        Err(LedgerError::SessionClosed {
            status: SessionStatus::Completed,
            ..
        })
    ));
}

#[tokio::test]
async fn test_sessions_are_private_to_their_owner() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let owner = ledger.open_account(&identity("ivy")).await.unwrap();
    let intruder = ledger.open_account(&identity("jack")).await.unwrap();
    ledger
        .apply_deposit(intruder.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();
    let session = start(&ledger, owner.id).await;

    assert!(matches!(
        ledger
            .apply_bet(intruder.id, BetRequest::new(session.id, 10))
            .await,
        Err(LedgerError::SessionNotFound(_))
    ));
    assert!(matches!(
        ledger.owned_session(intruder.id, session.id).await,
        Err(LedgerError::SessionNotFound(_))
    ));
    assert!(matches!(
        ledger
            .apply_bet(owner.id, BetRequest::new(Uuid::new_v4(), 10))
            .await,
        Err(LedgerError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_operator_rejected() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("kate")).await.unwrap();
    let missing = Uuid::new_v4();

    assert!(matches!(
        ledger
            .apply_deposit(user.id, DepositRequest::cash(10, 0).with_operator(missing))
            .await,
        Err(LedgerError::OperatorNotFound(id)) if id == missing
    ));
    assert!(matches!(
        ledger
            .start_session(user.id, StartSession::new(Uuid::new_v4(), missing))
            .await,
        Err(LedgerError::OperatorNotFound(_))
    ));
}

#[tokio::test]
async fn test_journal_merges_both_logs_newest_first() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("liam")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();
    let session = start(&ledger, user.id).await;
    ledger
        .apply_bet(user.id, BetRequest::new(session.id, 100))
        .await
        .unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::bonus(DepositKind::VipLevelUp, 50))
        .await
        .unwrap();

    let journal = ledger.journal(user.id, None).await.unwrap();
    let versions: Vec<i64> = journal.iter().map(JournalEntry::balance_version).collect();
    assert_eq!(versions, vec![3, 2, 1]);
    assert!(matches!(journal[1], JournalEntry::Bet(_)));

    let limited = ledger.journal(user.id, Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].balance_version(), 3);

    // Negative limits read as zero instead of reaching the store
    assert!(ledger.journal(user.id, Some(-1)).await.unwrap().is_empty());
    assert!(ledger.deposit_log(user.id, Some(-5)).await.unwrap().is_empty());
    assert!(ledger.bet_log(user.id, Some(i64::MIN)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_bonus_grants_are_recorded_active() {
    let (ledger, _) = ledger_with(FixedOutcome(0));
    let user = ledger.open_account(&identity("mona")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(1000, 0))
        .await
        .unwrap();

    let mut grant = DepositRequest::bonus(DepositKind::LongBonusDay1, 300);
    grant.expires_at = Some(chrono::Utc::now() + chrono::TimeDelta::days(7));
    ledger.apply_deposit(user.id, grant).await.unwrap();

    let mut stale = DepositRequest::bonus(DepositKind::LongBonusDay2, 300);
    stale.expires_at = Some(chrono::Utc::now() - chrono::TimeDelta::minutes(1));
    assert!(matches!(
        ledger.apply_deposit(user.id, stale).await,
        Err(LedgerError::InvalidExpiry { .. })
    ));

    let log = ledger.deposit_log(user.id, None).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].bonus_status, Some(BonusStatus::Active));
    assert!(log[0].expires_at.is_some());
    assert_eq!(log[1].bonus_status, None);
    assert_eq!(ledger.balance(user.id).await.unwrap().bonus_balance, 300);
}

#[tokio::test]
async fn test_operator_rollups() {
    let (ledger, store) = ledger_with(FixedOutcome(30));
    let operator = ledger
        .create_operator(NewOperator::named("Lucky Star"))
        .await
        .unwrap();
    assert_eq!(operator.balance, 100_000);
    assert!(operator.is_active);
    assert!(matches!(
        ledger.create_operator(NewOperator::named("Lucky Star")).await,
        Err(LedgerError::OperatorAlreadyExists(_))
    ));

    for tag in ["mia", "noah"] {
        let user = ledger.open_account(&identity(tag)).await.unwrap();
        ledger
            .apply_deposit(
                user.id,
                DepositRequest::cash(1000, 100).with_operator(operator.id),
            )
            .await
            .unwrap();
        let session = ledger
            .start_session(user.id, StartSession::new(Uuid::new_v4(), operator.id))
            .await
            .unwrap();
        ledger
            .apply_bet(user.id, BetRequest::new(session.id, 100))
            .await
            .unwrap();
    }

    let aggregator = OperatorAggregator::new(store);
    let totals = aggregator.totals(operator.id).await.unwrap();
    assert_eq!(totals.total_wagered, 200);
    assert_eq!(totals.total_won, 60);
    assert_eq!(totals.bet_count, 2);
    assert_eq!(totals.session_count, 2);
    assert_eq!(totals.player_count, 2);
    assert_eq!(totals.total_deposited, 2000);
    assert_eq!(totals.total_bonus_granted, 200);
    assert_eq!(totals.gross_gaming_revenue, 140);

    let house = aggregator.refresh(HOUSE_OPERATOR_ID).await.unwrap();
    assert_eq!(house.bet_count, 0);
    assert_eq!(aggregator.refresh_all().await.unwrap(), 2);
    assert!(aggregator.cached(operator.id).await.is_some());
}

#[tokio::test]
async fn test_background_refresh_populates_cache() {
    let (ledger, store) = ledger_with(FixedOutcome(0));
    let operator = ledger
        .create_operator(NewOperator::named("Night Owl"))
        .await
        .unwrap();

    let aggregator = OperatorAggregator::new(store);
    let handle = aggregator.spawn_refresh(std::time::Duration::from_millis(10));

    let mut cached = None;
    for _ in 0..50 {
        cached = aggregator.cached(operator.id).await;
        if cached.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.abort();
    assert_eq!(cached.map(|t| t.operator_id), Some(operator.id));
}
