use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use client::{
    CircuitInputs, ClientConfig, Error, LedgerClient, PoseidonCircuit, Proof, Prover,
    ShieldedWallet, SpendRequest,
};
use ledger::{
    DepositReceipt, EventCursor, LedgerConfig, LedgerEvent, NullifierPosition, SpendReceipt, Token,
};
use notes::{LeaseId, MemoryRepository, Note, NoteId, NoteRepository, NoteState, NoteStore};
use parking_lot::Mutex;
use primitives::{Address, Amount};
use testutil::{address, LocalProver, ScriptedProver, Step, TestLedger, TestPool};
use zk_primitives::{Element, PublicInputs};

fn amount(value: u128) -> Amount {
    Amount::new(value)
}

#[tokio::test]
async fn deposit_transfer_and_withdraw() {
    let pool = TestPool::default();
    let (alice, bob, carol, relayer) = (address(1), address(2), address(3), address(4));
    pool.fund(alice, amount(100));
    pool.gate.approve(bob);
    pool.gate.approve(carol);

    let alice_wallet = pool.wallet(alice, LocalProver::default());
    let bob_wallet = pool.wallet(bob, LocalProver::default());

    let first = alice_wallet.deposit(amount(60)).await.unwrap();
    let second = alice_wallet.deposit(amount(40)).await.unwrap();
    assert_eq!(first.leaf_index, Some(0));
    assert_eq!(second.leaf_index, Some(1));
    assert_eq!(alice_wallet.balance().unwrap(), amount(100));
    assert_eq!(pool.custody(), amount(100));
    assert_eq!(pool.token.balance_of(&alice), Amount::ZERO);

    let request = SpendRequest::transfer(bob, amount(70)).with_fee(amount(2), relayer);
    let outcome = alice_wallet.spend(request).await.unwrap();

    assert_eq!(outcome.spent.len(), 2);
    assert_eq!(outcome.receipt.leaf_indices, [2, 3]);
    assert_eq!(alice_wallet.balance().unwrap(), amount(28));
    assert_eq!(bob_wallet.balance().unwrap(), amount(70));
    assert_eq!(pool.token.balance_of(&relayer), amount(2));
    assert_eq!(pool.custody(), amount(98));
    for id in &outcome.spent {
        assert!(pool.store.get(*id).unwrap().is_spent());
    }

    let outcome = bob_wallet.withdraw(carol, amount(50)).await.unwrap();

    // the zero-value target note is not kept
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.created[0].value, amount(20));
    assert_eq!(bob_wallet.balance().unwrap(), amount(20));
    assert_eq!(pool.token.balance_of(&carol), amount(50));
    assert_eq!(pool.custody(), amount(48));
}

#[tokio::test]
async fn later_spends_see_every_leaf() {
    let pool = TestPool::default();
    let (alice, bob) = (address(1), address(2));
    pool.fund(alice, amount(30));
    pool.gate.approve(bob);

    let alice_wallet = pool.wallet(alice, LocalProver::default());
    let bob_wallet = pool.wallet(bob, LocalProver::default());

    for _ in 0..3 {
        alice_wallet.deposit(amount(10)).await.unwrap();
    }
    for _ in 0..3 {
        alice_wallet.transfer(bob, amount(5)).await.unwrap();
    }

    assert_eq!(alice_wallet.balance().unwrap(), amount(15));
    assert_eq!(bob_wallet.balance().unwrap(), amount(15));

    let root = bob_wallet.sync().await.unwrap();
    assert_eq!(root, pool.ledger.last_root().await.unwrap());
    assert_eq!(pool.ledger.next_leaf_index().await.unwrap(), 9);

    // every proof after the first reuses node hashes from the synced root
    assert!(alice_wallet.hash_cache_stats().hits > 0);
}

#[tokio::test]
async fn transfer_without_enough_value_reserves_nothing() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(10));
    let wallet = pool.wallet(alice, LocalProver::default());
    wallet.deposit(amount(10)).await.unwrap();

    let request = SpendRequest::transfer(address(2), amount(11));
    let err = wallet.spend(request).await.unwrap_err();

    assert!(matches!(err, Error::InsufficientNoteValue { .. }), "{err}");
    assert_eq!(wallet.balance().unwrap(), amount(10));
    assert!(wallet.store().staged(request.intent).unwrap().is_empty());
}

#[tokio::test]
async fn retry_after_prover_failure_reuses_outputs() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let prover = Arc::new(ScriptedProver::new(
        PoseidonCircuit,
        [Step::Fail("out of memory".to_string())],
    ));
    let wallet = pool.wallet(alice, Arc::clone(&prover));
    wallet.deposit(amount(50)).await.unwrap();

    let request = SpendRequest::transfer(address(2), amount(20));
    let err = wallet.spend(request).await.unwrap_err();
    assert!(matches!(err, Error::Prover(ref msg) if msg == "out of memory"), "{err}");

    // the input is free again and the outputs wait for the retry
    assert_eq!(wallet.balance().unwrap(), amount(50));
    assert_eq!(wallet.store().staged(request.intent).unwrap().len(), 2);

    let outcome = wallet.spend(request).await.unwrap();
    assert_eq!(outcome.created.len(), 2);

    let seen = prover.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].outputs, seen[1].outputs);
    assert_eq!(
        seen[0].public.out_commitments(),
        seen[1].public.out_commitments()
    );
    assert_eq!(seen[0].public.nullifier_1, seen[1].public.nullifier_1);
    assert_eq!(wallet.balance().unwrap(), amount(30));
}

#[tokio::test]
async fn prover_timeout_keeps_staged_outputs() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let prover = Arc::new(ScriptedProver::new(PoseidonCircuit, [Step::Hang]));
    let config = ClientConfig {
        prover_timeout_secs: 1,
        ..ClientConfig::default()
    };
    let wallet = pool.wallet_with_config(alice, Arc::clone(&prover), config);
    wallet.deposit(amount(50)).await.unwrap();

    let request = SpendRequest::withdraw(alice, amount(50));
    let err = wallet.spend(request).await.unwrap_err();
    assert!(matches!(err, Error::ProverTimeout(_)), "{err}");
    assert!(err.kind().is_retryable());
    assert_eq!(wallet.store().staged(request.intent).unwrap().len(), 2);

    wallet.spend(request).await.unwrap();
    let seen = prover.seen();
    assert_eq!(seen[0].outputs, seen[1].outputs);
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);
    assert_eq!(pool.token.balance_of(&alice), amount(50));
}

#[tokio::test]
async fn tampered_public_inputs_are_never_submitted() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let prover = ScriptedProver::new(PoseidonCircuit, [Step::Tamper]);
    let wallet = pool.wallet(alice, prover);
    wallet.deposit(amount(50)).await.unwrap();

    let request = SpendRequest::transfer(address(2), amount(20));
    let err = wallet.spend(request).await.unwrap_err();

    assert!(matches!(err, Error::MalformedProverResponse(_)), "{err}");
    assert_eq!(pool.ledger.next_leaf_index().await.unwrap(), 1);
    assert_eq!(wallet.balance().unwrap(), amount(50));
}

#[tokio::test]
async fn spent_input_is_marked_after_nullifier_rejection() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.gate.approve(address(2));
    pool.fund(alice, amount(50));

    let wallet = pool.wallet(alice, LocalProver::default());
    let note = wallet.deposit(amount(50)).await.unwrap();

    // a second device holding a copy of the same note
    let other_store = Arc::new(NoteStore::in_memory());
    other_store.save(&note).unwrap();
    let other = ShieldedWallet::new(
        alice,
        PoseidonCircuit,
        LocalProver::default(),
        pool.ledger.clone(),
        Arc::clone(&other_store),
        ClientConfig::default(),
    );

    wallet.transfer(address(2), amount(50)).await.unwrap();

    let request = SpendRequest::transfer(address(2), amount(50));
    let err = other.spend(request).await.unwrap_err();

    assert!(
        matches!(
            err,
            Error::Ledger(ledger::Error::NullifierSpent {
                position: NullifierPosition::First,
                ..
            })
        ),
        "{err}"
    );
    assert_eq!(other_store.get(note.id).unwrap().state, NoteState::Spent);
    assert!(other_store.staged(request.intent).unwrap().is_empty());
    assert_eq!(other.balance().unwrap(), Amount::ZERO);
}

/// Deposits into the pool while the first proof is being generated, moving the root on
struct RacingProver {
    ledger: TestLedger,
    raced: AtomicBool,
}

#[async_trait]
impl Prover for RacingProver {
    async fn prove(&self, inputs: &CircuitInputs) -> client::Result<Proof> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.ledger
                .deposit(address(9), Element::new(12345), amount(1))
                .await?;
        }

        LocalProver::default().prove(inputs).await
    }
}

#[tokio::test]
async fn stale_root_is_resynced_on_retry() {
    let pool = TestPool::new(LedgerConfig {
        root_history_size: 1,
        ..LedgerConfig::default()
    });
    let alice = address(1);
    pool.fund(alice, amount(50));
    pool.fund(address(9), amount(1));
    pool.gate.approve(address(2));

    let prover = RacingProver {
        ledger: pool.ledger.clone(),
        raced: AtomicBool::new(false),
    };
    let wallet = pool.wallet(alice, prover);
    wallet.deposit(amount(50)).await.unwrap();

    let request = SpendRequest::transfer(address(2), amount(20));
    let err = wallet.spend(request).await.unwrap_err();
    assert!(
        matches!(err, Error::Ledger(ledger::Error::UnknownRoot { .. })),
        "{err}"
    );
    assert!(wallet.store().staged(request.intent).unwrap().is_empty());
    assert_eq!(wallet.balance().unwrap(), amount(50));

    let outcome = wallet.spend(request).await.unwrap();
    assert_eq!(outcome.receipt.leaf_indices, [2, 3]);
    assert_eq!(wallet.balance().unwrap(), amount(30));
}

#[tokio::test]
async fn unapproved_holders_cannot_deposit() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.token.mint(alice, amount(10)).unwrap();

    let wallet = pool.wallet(alice, LocalProver::default());
    let err = wallet.deposit(amount(10)).await.unwrap_err();

    assert!(
        matches!(err, Error::Ledger(ledger::Error::NotApproved { .. })),
        "{err}"
    );
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);
    assert!(pool.store.all_for(wallet.owner()).unwrap().is_empty());
}

/// Applies every call to the pool's ledger, but loses the response to the next write when armed
struct DroppedReceipts {
    inner: TestLedger,
    armed: Arc<AtomicBool>,
}

impl DroppedReceipts {
    fn new(inner: TestLedger) -> Self {
        Self {
            inner,
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn drop_response<T>(&self, result: client::Result<T>) -> client::Result<T> {
        let receipt = result?;
        if self.armed.swap(false, Ordering::SeqCst) {
            let garbled = serde_json::from_str::<u64>("<html>bad gateway</html>").unwrap_err();
            return Err(garbled.into());
        }

        Ok(receipt)
    }
}

#[async_trait]
impl LedgerClient for DroppedReceipts {
    async fn deposit(
        &self,
        caller: Address,
        commitment: Element,
        amount: Amount,
    ) -> client::Result<DepositReceipt> {
        self.drop_response(self.inner.deposit(caller, commitment, amount).await)
    }

    async fn transact(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
    ) -> client::Result<SpendReceipt> {
        self.drop_response(self.inner.transact(caller, proof, public_inputs).await)
    }

    async fn withdraw(
        &self,
        caller: Address,
        proof: &[u8],
        public_inputs: &PublicInputs,
        recipient: Address,
        amount: Amount,
    ) -> client::Result<SpendReceipt> {
        let result = self
            .inner
            .withdraw(caller, proof, public_inputs, recipient, amount)
            .await;
        self.drop_response(result)
    }

    async fn last_root(&self) -> client::Result<Element> {
        self.inner.last_root().await
    }

    async fn next_leaf_index(&self) -> client::Result<u64> {
        self.inner.next_leaf_index().await
    }

    async fn nullifier_used(&self, nullifier: Element) -> client::Result<bool> {
        self.inner.nullifier_used(nullifier).await
    }

    async fn events_since(
        &self,
        cursor: EventCursor,
    ) -> client::Result<(Vec<LedgerEvent>, EventCursor)> {
        self.inner.events_since(cursor).await
    }
}

#[tokio::test]
async fn lost_spend_receipt_is_recovered_on_retry() {
    let pool = TestPool::default();
    let (alice, bob) = (address(1), address(2));
    pool.fund(alice, amount(50));
    pool.gate.approve(bob);

    let ledger = DroppedReceipts::new(pool.ledger.clone());
    let armed = Arc::clone(&ledger.armed);
    let wallet = ShieldedWallet::new(
        alice,
        PoseidonCircuit,
        LocalProver::default(),
        ledger,
        Arc::clone(&pool.store),
        ClientConfig::default(),
    );
    let bob_wallet = pool.wallet(bob, LocalProver::default());
    let note = wallet.deposit(amount(50)).await.unwrap();

    armed.store(true, Ordering::SeqCst);
    let request = SpendRequest::transfer(bob, amount(20));
    let err = wallet.spend(request).await.unwrap_err();
    assert!(matches!(err, Error::SerdeJson(_)), "{err}");
    assert_eq!(pool.ledger.next_leaf_index().await.unwrap(), 3);
    assert_eq!(wallet.store().staged(request.intent).unwrap().len(), 2);

    let outcome = wallet.spend(request).await.unwrap();
    assert_eq!(outcome.receipt.leaf_indices, [1, 2]);
    assert_eq!(outcome.spent, vec![note.id]);
    assert_eq!(outcome.created.len(), 2);

    assert_eq!(wallet.balance().unwrap(), amount(30));
    assert_eq!(bob_wallet.balance().unwrap(), amount(20));
    assert!(pool.store.get(note.id).unwrap().is_spent());
    assert!(pool.store.pending().unwrap().is_empty());

    // nothing was submitted twice
    assert_eq!(pool.ledger.next_leaf_index().await.unwrap(), 3);
    assert_eq!(pool.custody(), amount(50));
}

#[tokio::test]
async fn lost_receipts_are_settled_by_sync() {
    let pool = TestPool::default();
    let (alice, bob) = (address(1), address(2));
    pool.fund(alice, amount(50));
    pool.gate.approve(bob);

    let ledger = DroppedReceipts::new(pool.ledger.clone());
    let armed = Arc::clone(&ledger.armed);
    let wallet = ShieldedWallet::new(
        alice,
        PoseidonCircuit,
        LocalProver::default(),
        ledger,
        Arc::clone(&pool.store),
        ClientConfig::default(),
    );
    let bob_wallet = pool.wallet(bob, LocalProver::default());

    armed.store(true, Ordering::SeqCst);
    let err = wallet.deposit(amount(50)).await.unwrap_err();
    assert!(matches!(err, Error::SerdeJson(_)), "{err}");
    assert_eq!(pool.custody(), amount(50));
    assert_eq!(wallet.balance().unwrap(), Amount::ZERO);

    wallet.sync().await.unwrap();
    let notes = wallet.unspent_notes().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].leaf_index, Some(0));
    assert_eq!(notes[0].value, amount(50));

    armed.store(true, Ordering::SeqCst);
    let err = wallet.transfer(bob, amount(20)).await.unwrap_err();
    assert!(matches!(err, Error::SerdeJson(_)), "{err}");

    wallet.sync().await.unwrap();
    assert_eq!(wallet.balance().unwrap(), amount(30));
    assert_eq!(bob_wallet.balance().unwrap(), amount(20));
    assert!(pool.store.pending().unwrap().is_empty());
}

#[tokio::test]
async fn failed_transfers_leave_nothing_staged() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let prover = ScriptedProver::new(PoseidonCircuit, [Step::Fail("out of memory".to_string())]);
    let wallet = pool.wallet(alice, prover);
    wallet.deposit(amount(50)).await.unwrap();

    let err = wallet.transfer(address(2), amount(20)).await.unwrap_err();
    assert!(matches!(err, Error::Prover(_)), "{err}");
    assert!(pool.store.pending().unwrap().is_empty());
    assert_eq!(wallet.balance().unwrap(), amount(50));
}

/// A repository shared with another spender, who reserves the armed note just before we read it
#[derive(Default)]
struct ContendedRepository {
    inner: MemoryRepository,
    contended: Mutex<Option<NoteId>>,
}

impl NoteRepository for ContendedRepository {
    fn get(&self, id: NoteId) -> notes::Result<Option<Note>> {
        let mut contended = self.contended.lock();
        if *contended == Some(id) {
            *contended = None;

            if let Some(mut note) = self.inner.get(id)? {
                note.state = NoteState::Reserved {
                    lease: LeaseId::new(),
                    expires_at: Utc::now() + chrono::Duration::minutes(5),
                };
                self.inner.put(&note)?;
            }
        }
        drop(contended);

        self.inner.get(id)
    }

    fn put_all(&self, notes: &[Note]) -> notes::Result<()> {
        self.inner.put_all(notes)
    }

    fn remove(&self, id: NoteId) -> notes::Result<()> {
        self.inner.remove(id)
    }

    fn list(&self) -> notes::Result<Vec<Note>> {
        self.inner.list()
    }
}

#[tokio::test]
async fn losing_the_reservation_race_stages_nothing() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let store = Arc::new(NoteStore::new(ContendedRepository::default()));
    let wallet = ShieldedWallet::new(
        alice,
        PoseidonCircuit,
        LocalProver::default(),
        pool.ledger.clone(),
        Arc::clone(&store),
        ClientConfig::default(),
    );
    let note = wallet.deposit(amount(50)).await.unwrap();
    *store.repository().contended.lock() = Some(note.id);

    let request = SpendRequest::transfer(address(2), amount(20));
    let err = wallet.spend(request).await.unwrap_err();

    assert!(
        matches!(err, Error::Notes(notes::Error::NotSpendable { id, .. }) if id == note.id),
        "{err}"
    );
    assert!(store.pending().unwrap().is_empty());
    assert_eq!(pool.ledger.next_leaf_index().await.unwrap(), 1);
}

#[tokio::test]
async fn reaper_reclaims_reservations_of_abandoned_spends() {
    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, amount(50));

    let config = ClientConfig {
        lease_secs: 1,
        ..ClientConfig::default()
    };
    let prover = ScriptedProver::new(PoseidonCircuit, [Step::Hang]);
    let wallet = pool.wallet_with_config(alice, prover, config);
    wallet.start_lease_reaper();
    let note = wallet.deposit(amount(50)).await.unwrap();

    // the caller gives up on the spend while the proof is still running
    let abandoned =
        tokio::time::timeout(Duration::from_millis(200), wallet.transfer(address(2), amount(20)))
            .await;
    assert!(abandoned.is_err());
    assert!(matches!(
        pool.store.get(note.id).unwrap().state,
        NoteState::Reserved { .. }
    ));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(pool.store.get(note.id).unwrap().state, NoteState::Unspent);
}
