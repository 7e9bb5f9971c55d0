//! Concurrency tests for the ledger.
//!
//! Verifies that concurrent mutations on one user serialize, that two ledger
//! instances sharing a store resolve lost updates through the version check,
//! and that stale commits surface as conflicts once retries run out.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use uuid::Uuid;
use wager_ledger::{
    Amount, Balance, BetRequest, DepositRequest, Ledger, LedgerError, LedgerPolicy, LedgerResult,
    User, UserId,
    db::{InMemoryLedgerStore, LedgerStore},
    identity::VerifiedIdentity,
    journal::{BetLogEntry, DepositLogEntry},
    ledger::{NewUser, transitions},
    outcome::{FixedOutcome, OutcomeGenerator},
    session::{GameSession, HOUSE_OPERATOR_ID, Operator, OperatorId, OperatorTotals, SessionId, StartSession},
};

fn identity(tag: &str) -> VerifiedIdentity {
    VerifiedIdentity::new(format!("auth-{tag}"), format!("{tag}@example.com"), None).unwrap()
}

fn policy(max_conflict_retries: u32) -> LedgerPolicy {
    LedgerPolicy {
        max_conflict_retries,
        ..LedgerPolicy::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bets_serialize() {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let ledger = Arc::new(Ledger::new(
        store,
        Arc::new(FixedOutcome(0)),
        LedgerPolicy::default(),
    ));
    let user = ledger.open_account(&identity("racer")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(10_000, 500))
        .await
        .unwrap();
    let session = ledger
        .start_session(user.id, StartSession::new(Uuid::new_v4(), HOUSE_OPERATOR_ID))
        .await
        .unwrap();

    let (user_id, session_id) = (user.id, session.id);
    let bets = 50;
    let mut handles = Vec::new();
    for _ in 0..bets {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger
                .apply_bet(user_id, BetRequest::new(session_id, 100))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balance = ledger.balance(user.id).await.unwrap();
    assert_eq!(balance.playable(), 10_500 - 100 * bets);
    assert_eq!(balance.bonus_balance, 0);
    assert_eq!(balance.real_balance, 5_500);
    assert_eq!(balance.version, 1 + bets);

    let session = ledger.session(session.id).await.unwrap();
    assert_eq!(session.total_bets, bets);

    let report = ledger.reconcile(user.id).await.unwrap();
    assert!(report.is_consistent(), "{report:?}");
}

/// Pays 1.5x on a wager of exactly 300, nothing otherwise
struct PaysOnThreeHundred;

impl OutcomeGenerator for PaysOnThreeHundred {
    fn win_amount(&self, wager: Amount) -> Amount {
        if wager == 300 { 450 } else { 0 }
    }
}

const CONTENDED_FUNDS: Amount = 1_000;
const CONTENDED_WAGERS: [Amount; 5] = [600, 500, 400, 300, 200];

/// Final balance and sorted accepted wagers after running `order` one at a time
fn run_sequentially(order: &[Amount]) -> (Amount, Vec<Amount>) {
    let outcome = PaysOnThreeHundred;
    let mut balance = CONTENDED_FUNDS;
    let mut accepted = Vec::new();
    for &wager in order {
        if wager <= balance {
            balance = balance - wager + outcome.win_amount(wager);
            accepted.push(wager);
        }
    }
    accepted.sort_unstable();
    (balance, accepted)
}

fn permutations(items: &[Amount]) -> Vec<Vec<Amount>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut all = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let first = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            all.push(tail);
        }
    }
    all
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_contended_bets_match_a_sequential_order() {
    let serial_outcomes: BTreeSet<(Amount, Vec<Amount>)> = permutations(&CONTENDED_WAGERS)
        .iter()
        .map(|order| run_sequentially(order))
        .collect();
    // The final state depends on the order, and every order rejects something
    assert!(serial_outcomes.len() > 1);
    assert!(
        serial_outcomes
            .iter()
            .all(|(_, accepted)| accepted.len() < CONTENDED_WAGERS.len())
    );

    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let instances = [
        Arc::new(Ledger::new(
            store.clone(),
            Arc::new(PaysOnThreeHundred),
            policy(1_000),
        )),
        Arc::new(Ledger::new(store, Arc::new(PaysOnThreeHundred), policy(1_000))),
    ];

    for round in 0..20 {
        let ledger = &instances[0];
        let user = ledger
            .open_account(&identity(&format!("contended-{round}")))
            .await
            .unwrap();
        ledger
            .apply_deposit(user.id, DepositRequest::cash(CONTENDED_FUNDS, 0))
            .await
            .unwrap();
        let session = ledger
            .start_session(user.id, StartSession::new(Uuid::new_v4(), HOUSE_OPERATOR_ID))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for (i, wager) in CONTENDED_WAGERS.into_iter().enumerate() {
            let ledger = Arc::clone(&instances[i % instances.len()]);
            let (user_id, session_id) = (user.id, session.id);
            handles.push(tokio::spawn(async move {
                let result = ledger
                    .apply_bet(user_id, BetRequest::new(session_id, wager))
                    .await;
                (wager, result)
            }));
        }

        let mut accepted = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                (wager, Ok(_)) => accepted.push(wager),
                (_, Err(LedgerError::InsufficientFunds { .. })) => {}
                (wager, Err(e)) => panic!("bet of {wager} failed unexpectedly: {e}"),
            }
        }
        accepted.sort_unstable();

        let balance = ledger.balance(user.id).await.unwrap();
        let observed = (balance.real_balance, accepted.clone());
        assert!(
            serial_outcomes.contains(&observed),
            "round {round}: {observed:?} matches no sequential order"
        );
        assert_eq!(balance.version, 1 + accepted.len() as i64);

        let session = ledger.session(session.id).await.unwrap();
        assert_eq!(session.total_bets, accepted.len() as i64);

        let report = ledger.reconcile(user.id).await.unwrap();
        assert!(report.chain_breaks.is_empty(), "{report:?}");
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(report.entries_replayed, 1 + accepted.len());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_instances_share_one_store() {
    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
    let first = Arc::new(Ledger::new(
        store.clone(),
        Arc::new(FixedOutcome(0)),
        policy(1_000),
    ));
    let second = Arc::new(Ledger::new(store, Arc::new(FixedOutcome(0)), policy(1_000)));

    let user_id = first.open_account(&identity("shared")).await.unwrap().id;

    let mut handles = Vec::new();
    for i in 0..40 {
        let ledger = if i % 2 == 0 {
            Arc::clone(&first)
        } else {
            Arc::clone(&second)
        };
        handles.push(tokio::spawn(async move {
            ledger
                .apply_deposit(user_id, DepositRequest::cash(25, 0))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let balance = second.balance(user_id).await.unwrap();
    assert_eq!(balance.real_balance, 1_000);
    assert_eq!(balance.version, 40);
    assert!(first.reconcile(user_id).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_unrelated_users_do_not_interfere() {
    let ledger = Arc::new(Ledger::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(FixedOutcome(0)),
        LedgerPolicy::default(),
    ));
    let a = ledger.open_account(&identity("a")).await.unwrap();
    let b = ledger.open_account(&identity("b")).await.unwrap();

    let (ra, rb) = tokio::join!(
        ledger.apply_deposit(a.id, DepositRequest::cash(10, 0)),
        ledger.apply_deposit(b.id, DepositRequest::cash(20, 0)),
    );
    assert_eq!(ra.unwrap().real_balance, 10);
    assert_eq!(rb.unwrap().real_balance, 20);
}

/// Commits a competing deposit just before forwarding the next
/// `interference` commits, so each of them arrives with a stale version.
struct InterferingStore {
    inner: InMemoryLedgerStore,
    interference: AtomicU32,
}

impl InterferingStore {
    fn new(interference: u32) -> Self {
        Self {
            inner: InMemoryLedgerStore::new(),
            interference: AtomicU32::new(interference),
        }
    }

    async fn interfere(&self, user_id: UserId) -> LedgerResult<()> {
        if self
            .interference
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            return Ok(());
        }

        let before = self.inner.load_balance(user_id).await?;
        let rival = transitions::deposit(
            &before,
            &DepositRequest::cash(1, 0),
            &LedgerPolicy::default(),
            chrono::Utc::now(),
        )?;
        let entry = DepositLogEntry {
            id: Uuid::new_v4(),
            user_id,
            cashier_id: None,
            operator_id: HOUSE_OPERATOR_ID,
            game_name: None,
            kind: wager_ledger::journal::DepositKind::DepositCashapp,
            balance_version: rival.balance.version,
            change: rival.change,
            metadata: None,
            bonus_status: None,
            expires_at: None,
            activated_at: None,
            completed_at: None,
            created_at: chrono::Utc::now(),
        };
        self.inner
            .commit_deposit(before.version, &rival.balance, &entry)
            .await
    }
}

#[async_trait]
impl LedgerStore for InterferingStore {
    async fn health_check(&self) -> LedgerResult<()> {
        self.inner.health_check().await
    }

    async fn create_user(&self, new_user: NewUser) -> LedgerResult<User> {
        self.inner.create_user(new_user).await
    }

    async fn find_user_by_auth_id(&self, auth_id: &str) -> LedgerResult<Option<User>> {
        self.inner.find_user_by_auth_id(auth_id).await
    }

    async fn find_user(&self, user_id: UserId) -> LedgerResult<Option<User>> {
        self.inner.find_user(user_id).await
    }

    async fn update_display_name(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
    ) -> LedgerResult<User> {
        self.inner.update_display_name(user_id, display_name).await
    }

    async fn load_balance(&self, user_id: UserId) -> LedgerResult<Balance> {
        self.inner.load_balance(user_id).await
    }

    async fn commit_deposit(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &DepositLogEntry,
    ) -> LedgerResult<()> {
        self.interfere(balance.user_id).await?;
        self.inner
            .commit_deposit(expected_version, balance, entry)
            .await
    }

    async fn commit_bet(
        &self,
        expected_version: i64,
        balance: &Balance,
        entry: &BetLogEntry,
    ) -> LedgerResult<GameSession> {
        self.interfere(balance.user_id).await?;
        self.inner.commit_bet(expected_version, balance, entry).await
    }

    async fn deposit_log(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> LedgerResult<Vec<DepositLogEntry>> {
        self.inner.deposit_log(user_id, limit).await
    }

    async fn bet_log(&self, user_id: UserId, limit: Option<i64>) -> LedgerResult<Vec<BetLogEntry>> {
        self.inner.bet_log(user_id, limit).await
    }

    async fn create_session(&self, session: &GameSession) -> LedgerResult<()> {
        self.inner.create_session(session).await
    }

    async fn get_session(&self, session_id: SessionId) -> LedgerResult<Option<GameSession>> {
        self.inner.get_session(session_id).await
    }

    async fn close_session(&self, session: &GameSession) -> LedgerResult<()> {
        self.inner.close_session(session).await
    }

    async fn create_operator(&self, operator: &Operator) -> LedgerResult<()> {
        self.inner.create_operator(operator).await
    }

    async fn get_operator(&self, operator_id: OperatorId) -> LedgerResult<Option<Operator>> {
        self.inner.get_operator(operator_id).await
    }

    async fn list_operators(&self) -> LedgerResult<Vec<Operator>> {
        self.inner.list_operators().await
    }

    async fn operator_totals(&self, operator_id: OperatorId) -> LedgerResult<OperatorTotals> {
        self.inner.operator_totals(operator_id).await
    }
}

#[tokio::test]
async fn test_stale_commit_is_retried() {
    let store = Arc::new(InterferingStore::new(2));
    let ledger = Ledger::new(store.clone(), Arc::new(FixedOutcome(0)), policy(3));
    let user = ledger.open_account(&identity("retry")).await.unwrap();

    let balance = ledger
        .apply_deposit(user.id, DepositRequest::cash(100, 0))
        .await
        .unwrap();

    // Two rival deposits of 1 landed first, then ours on top
    assert_eq!(balance.real_balance, 102);
    assert_eq!(balance.version, 3);
    assert!(ledger.reconcile(user.id).await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_conflict_surfaces_when_retries_exhausted() {
    let store = Arc::new(InterferingStore::new(u32::MAX));
    let ledger = Ledger::new(store.clone(), Arc::new(FixedOutcome(0)), policy(2));
    let user = ledger.open_account(&identity("stale")).await.unwrap();

    let err = ledger
        .apply_deposit(user.id, DepositRequest::cash(100, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConcurrencyConflict { user_id } if user_id == user.id));

    // Only the three rival deposits made it in
    let balance = ledger.balance(user.id).await.unwrap();
    assert_eq!(balance.real_balance, 3);
}

#[tokio::test]
async fn test_retried_bet_keeps_its_payout() {
    let store = Arc::new(InterferingStore::new(0));
    let ledger = Ledger::new(store.clone(), Arc::new(FixedOutcome(70)), policy(3));
    let user = ledger.open_account(&identity("payout")).await.unwrap();
    ledger
        .apply_deposit(user.id, DepositRequest::cash(100, 0))
        .await
        .unwrap();
    let session = ledger
        .start_session(user.id, StartSession::new(Uuid::new_v4(), HOUSE_OPERATOR_ID))
        .await
        .unwrap();

    store.interference.store(1, Ordering::SeqCst);
    let outcome = ledger
        .apply_bet(user.id, BetRequest::new(session.id, 50))
        .await
        .unwrap();

    assert_eq!(outcome.win_amount, 70);
    // 100 + 1 rival - 50 + 70
    assert_eq!(outcome.balance.real_balance, 121);
    assert_eq!(outcome.entry.change.real_amount_before, 101);
    assert_eq!(ledger.bet_log(user.id, None).await.unwrap().len(), 1);
}
