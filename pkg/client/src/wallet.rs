use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use accumulator::{CacheStats, CachedHasher, TreeReplica, TREE_DEPTH};
use chrono::Utc;
use ledger::{EventCursor, SpendReceipt};
use notes::{
    owner_for_address, LeaseReaper, MemoryRepository, Note, NoteId, NoteRepository, NoteState,
    NoteStore, SpendIntent,
};
use parking_lot::Mutex;
use primitives::{Address, Amount, TickWorker};
use rand::rngs::OsRng;
use tracing::{debug, info, warn};
use zk_primitives::Element;

use crate::{
    assembler::select_notes, Circuit, ClientConfig, Error, LedgerClient, Proof,
    ProofInputAssembler, Prover, Result,
};

/// How many times [`ShieldedWallet::sync`] replays events before giving up
const SYNC_ATTEMPTS: usize = 3;

/// Where the value of a spend goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendKind {
    /// A new note for `recipient`, inside the pool
    Transfer { recipient: Address },
    /// Tokens paid out of custody to `recipient`
    Withdraw { recipient: Address },
}

/// One logical spend
///
/// Retrying a failed spend with the same request (and so the same intent) reuses the output
/// notes staged by the first attempt. If an earlier attempt was accepted but its receipt never
/// arrived, the retry returns that attempt's outcome instead of spending again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendRequest {
    pub intent: SpendIntent,
    pub kind: SpendKind,
    pub amount: Amount,
    pub fee: Amount,
    pub relayer: Option<Address>,
}

impl SpendRequest {
    #[must_use]
    pub fn transfer(recipient: Address, amount: Amount) -> Self {
        Self::new(SpendKind::Transfer { recipient }, amount)
    }

    #[must_use]
    pub fn withdraw(recipient: Address, amount: Amount) -> Self {
        Self::new(SpendKind::Withdraw { recipient }, amount)
    }

    fn new(kind: SpendKind, amount: Amount) -> Self {
        Self {
            intent: SpendIntent::new(),
            kind,
            amount,
            fee: Amount::ZERO,
            relayer: None,
        }
    }

    #[must_use]
    pub fn with_fee(mut self, fee: Amount, relayer: Address) -> Self {
        self.fee = fee;
        self.relayer = Some(relayer);
        self
    }
}

/// The result of an accepted spend
#[derive(Debug, Clone)]
pub struct SpendOutcome {
    pub intent: SpendIntent,
    /// For a spend settled by [`ShieldedWallet::sync`], the root is the one that sync agreed on
    pub receipt: SpendReceipt,
    /// The input notes, now spent
    ///
    /// A spend settled by sync lists every note of this holder it found spent on the ledger.
    pub spent: Vec<NoteId>,
    /// The output notes with value, now unspent
    pub created: Vec<Note>,
}

/// A failed spend attempt, and whether it reached the ledger
struct Failure {
    error: Error,
    submitted: bool,
}

impl Failure {
    fn submitted(error: Error) -> Self {
        Self {
            error,
            submitted: true,
        }
    }
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Self {
            error,
            submitted: false,
        }
    }
}

impl From<notes::Error> for Failure {
    fn from(error: notes::Error) -> Self {
        Error::from(error).into()
    }
}

struct Replica {
    tree: TreeReplica<TREE_DEPTH, CachedHasher>,
    cursor: EventCursor,
}

impl Replica {
    fn reset(&mut self) {
        self.tree.reset();
        self.cursor = EventCursor::START;
    }
}

/// One holder's view of the pool
pub struct ShieldedWallet<C, P, L, R: NoteRepository = MemoryRepository> {
    address: Address,
    owner: Element,
    assembler: ProofInputAssembler<C>,
    prover: P,
    ledger: L,
    store: Arc<NoteStore<R>>,
    replica: Mutex<Replica>,
    hasher: CachedHasher,
    /// Spends accepted by the ledger whose outcome reached this wallet through sync
    settled: Mutex<HashMap<SpendIntent, SpendOutcome>>,
    reaper: Mutex<Option<TickWorker<LeaseReaper<R>>>>,
    config: ClientConfig,
}

impl<C, P, L, R> ShieldedWallet<C, P, L, R>
where
    C: Circuit,
    P: Prover,
    L: LedgerClient,
    R: NoteRepository,
{
    pub fn new(
        address: Address,
        circuit: C,
        prover: P,
        ledger: L,
        store: Arc<NoteStore<R>>,
        config: ClientConfig,
    ) -> Self {
        let hasher = CachedHasher::default();

        Self {
            address,
            owner: owner_for_address(&address),
            assembler: ProofInputAssembler::new(circuit),
            prover,
            ledger,
            store,
            replica: Mutex::new(Replica {
                tree: TreeReplica::with_hasher(hasher.clone()),
                cursor: EventCursor::START,
            }),
            hasher,
            settled: Mutex::new(HashMap::new()),
            reaper: Mutex::new(None),
            config,
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The owner field of this holder's notes
    #[must_use]
    pub fn owner(&self) -> Element {
        self.owner
    }

    pub fn store(&self) -> &Arc<NoteStore<R>> {
        &self.store
    }

    /// Spendable notes, in leaf order
    pub fn unspent_notes(&self) -> Result<Vec<Note>> {
        Ok(self.store.unspent_for(self.owner)?)
    }

    pub fn balance(&self) -> Result<Amount> {
        Ok(self.unspent_notes()?.iter().map(|note| note.value).sum())
    }

    /// Hits and misses of the replica's node hash cache
    #[must_use]
    pub fn hash_cache_stats(&self) -> CacheStats {
        self.hasher.stats()
    }

    /// Return lapsed reservations in the note store to the unspent pool in the background
    ///
    /// Must be called from within a tokio runtime. The reaper stops when the wallet is dropped.
    /// Without it, lapsed reservations are still spendable but keep their reserved state.
    pub fn start_lease_reaper(&self) {
        let mut reaper = self.reaper.lock();
        if reaper.is_some() {
            return;
        }

        let worker = TickWorker::new();
        let _task = worker.run(LeaseReaper::new(Arc::clone(&self.store)));
        *reaper = Some(worker);
    }

    fn wake_reaper(&self) {
        if let Some(worker) = &*self.reaper.lock() {
            worker.tick();
        }
    }

    /// Bring the tree replica up to date with the ledger, returning the agreed root
    ///
    /// Staged outputs whose commitments are now in the tree are settled, so spends and deposits
    /// whose receipt was lost are not lost with it.
    pub async fn sync(&self) -> Result<Element> {
        let root = self.sync_tree().await?;
        self.settle_pending(root).await?;
        Ok(root)
    }

    async fn sync_tree(&self) -> Result<Element> {
        let mut attempt = 1;

        loop {
            let cursor = self.replica.lock().cursor;
            let (events, next_cursor) = self.ledger.events_since(cursor).await?;
            let remote_leaf_count = self.ledger.next_leaf_index().await?;
            let remote_root = self.ledger.last_root().await?;

            let mut replica = self.replica.lock();
            match Self::apply_events(&mut replica, &events, remote_leaf_count, remote_root) {
                Ok(root) => {
                    replica.cursor = next_cursor;
                    debug!(%root, leaves = remote_leaf_count, "tree replica synced");
                    return Ok(root);
                }
                Err(err) if attempt < SYNC_ATTEMPTS => {
                    warn!(%err, attempt, "tree replica diverged, rebuilding");
                    replica.reset();
                    attempt += 1;
                }
                Err(err) => {
                    replica.reset();
                    return Err(err.into());
                }
            }
        }
    }

    fn apply_events(
        replica: &mut Replica,
        events: &[ledger::LedgerEvent],
        remote_leaf_count: u64,
        remote_root: Element,
    ) -> accumulator::Result<Element> {
        replica.tree.begin_sync();
        for (leaf_index, commitment) in events.iter().filter_map(ledger::LedgerEvent::leaf) {
            replica.tree.apply_leaf(leaf_index, commitment)?;
        }

        replica.tree.finish_sync(remote_leaf_count, remote_root)
    }

    /// Settle every intent of this holder whose staged outputs all appear in the synced tree
    async fn settle_pending(&self, root: Element) -> Result<()> {
        let applied = self.applied_intents()?;
        if applied.is_empty() {
            return Ok(());
        }

        let spent = if applied.iter().any(|(_, leaves)| leaves.len() > 1) {
            self.spent_on_ledger().await?
        } else {
            Vec::new()
        };

        let mut settled = self.settled.lock();
        for (intent, leaf_indices) in applied {
            // settled by its own spend while the nullifiers were being checked
            if self.store.staged(intent)?.is_empty() {
                continue;
            }

            match leaf_indices[..] {
                [leaf_index] => {
                    self.store.complete_spend(&[], intent, &[leaf_index])?;
                    info!(%intent, leaf_index, "deposit settled from the ledger's events");
                }
                [target, change] => {
                    let leaf_indices = [target, change];
                    let created = self.store.complete_spend(&spent, intent, &leaf_indices)?;
                    info!(%intent, ?leaf_indices, "spend settled from the ledger's events");

                    settled.insert(
                        intent,
                        SpendOutcome {
                            intent,
                            receipt: SpendReceipt { leaf_indices, root },
                            spent: spent.clone(),
                            created,
                        },
                    );
                }
                _ => warn!(%intent, count = leaf_indices.len(), "unexpected number of staged outputs"),
            }
        }

        Ok(())
    }

    /// Pending intents started by this holder, with the leaf of each staged output
    ///
    /// The last slot of an intent is always the starter's own note: a deposit, or a spend's change.
    fn applied_intents(&self) -> Result<Vec<(SpendIntent, Vec<u64>)>> {
        let mut by_intent: BTreeMap<SpendIntent, Vec<Note>> = BTreeMap::new();
        for note in self.store.pending()? {
            if let NoteState::Pending { intent, .. } = note.state {
                by_intent.entry(intent).or_default().push(note);
            }
        }

        by_intent.retain(|_, staged| staged.last().is_some_and(|note| note.owner == self.owner));
        if by_intent.is_empty() {
            return Ok(Vec::new());
        }

        let replica = self.replica.lock();
        let leaves: HashMap<Element, u64> = replica
            .tree
            .tree()
            .leaves()
            .iter()
            .zip(0..)
            .map(|(commitment, leaf_index)| (*commitment, leaf_index))
            .collect();

        Ok(by_intent
            .into_iter()
            .filter_map(|(intent, staged)| {
                staged
                    .iter()
                    .map(|note| leaves.get(&note.commitment).copied())
                    .collect::<Option<Vec<_>>>()
                    .map(|leaf_indices| (intent, leaf_indices))
            })
            .collect())
    }

    /// This holder's unspent or reserved notes whose nullifier the ledger has recorded
    async fn spent_on_ledger(&self) -> Result<Vec<NoteId>> {
        let mut spent = Vec::new();
        for note in self.store.all_for(self.owner)? {
            if !matches!(note.state, NoteState::Unspent | NoteState::Reserved { .. }) {
                continue;
            }

            let Some(nullifier) = self.assembler.nullifier(&note) else {
                continue;
            };

            if self.ledger.nullifier_used(nullifier).await? {
                spent.push(note.id);
            }
        }

        Ok(spent)
    }

    /// Deposit `amount` into a new note for this holder
    ///
    /// The note is staged before the ledger call. If the response is lost the note stays staged,
    /// and the next [`ShieldedWallet::sync`] confirms it once its leaf shows up.
    #[tracing::instrument(err, skip(self), fields(address = %self.address))]
    pub async fn deposit(&self, amount: Amount) -> Result<Note> {
        let intent = SpendIntent::new();
        let secret = Element::random_secret(&mut OsRng);
        let commitment = self
            .assembler
            .circuit()
            .commitment(amount.to_element(), secret, self.owner);

        let note = Note::pending(intent, 0, amount, secret, self.owner, commitment);
        self.store.stage(std::slice::from_ref(&note))?;

        match self.ledger.deposit(self.address, commitment, amount).await {
            Ok(receipt) => {
                let note = self.store.confirm(note.id, receipt.leaf_index)?;
                info!(note = %note.id, leaf_index = receipt.leaf_index, "deposit confirmed");
                Ok(note)
            }
            Err(err @ Error::Ledger(_)) => {
                self.store.discard_staged(intent)?;
                Err(err)
            }
            Err(err) => {
                warn!(%intent, "deposit outcome unknown, keeping the note staged");
                Err(err)
            }
        }
    }

    /// Send `amount` to another holder inside the pool
    ///
    /// The request is not returned, so a failure here cannot be retried. Outputs of an attempt
    /// that never reached the ledger are discarded. Use [`ShieldedWallet::spend`] to retry.
    pub async fn transfer(&self, recipient: Address, amount: Amount) -> Result<SpendOutcome> {
        self.spend_once(self.with_default_fee(SpendRequest::transfer(recipient, amount)))
            .await
    }

    /// Pay `amount` out of the pool to `recipient`
    ///
    /// Like [`ShieldedWallet::transfer`], this cannot be retried.
    pub async fn withdraw(&self, recipient: Address, amount: Amount) -> Result<SpendOutcome> {
        self.spend_once(self.with_default_fee(SpendRequest::withdraw(recipient, amount)))
            .await
    }

    fn with_default_fee(&self, request: SpendRequest) -> SpendRequest {
        match self.config.relayer {
            Some(relayer) if !self.config.fee.is_zero() => request.with_fee(self.config.fee, relayer),
            _ => request,
        }
    }

    /// Run a spend end to end: select and reserve notes, stage outputs, prove, submit, settle
    ///
    /// On a ledger rejection the reservation is released, the replica is resynced, and the staged
    /// outputs are discarded unless an earlier attempt put them in the tree. On any other failure
    /// the staged outputs are kept, so retrying `request` reuses them.
    #[tracing::instrument(err, skip_all, fields(intent = %request.intent, address = %self.address))]
    pub async fn spend(&self, request: SpendRequest) -> Result<SpendOutcome> {
        self.attempt(&request).await.map_err(|failure| failure.error)
    }

    async fn spend_once(&self, request: SpendRequest) -> Result<SpendOutcome> {
        self.attempt(&request).await.map_err(|failure| {
            if !failure.submitted {
                log_failure(self.store.discard_staged(request.intent), "discard staged outputs");
            }
            failure.error
        })
    }

    async fn attempt(&self, request: &SpendRequest) -> Result<SpendOutcome, Failure> {
        self.sync().await?;
        if let Some(outcome) = self.settled.lock().remove(&request.intent) {
            info!("spend was already accepted");
            return Ok(outcome);
        }

        let (inputs, outputs, planned) = self.prepare(request)?;
        let ids: Vec<NoteId> = inputs.iter().map(|note| note.id).collect();
        let reservation = self
            .store
            .reserve(&ids, self.config.lease_duration(), Utc::now())?;
        self.wake_reaper();

        if planned {
            if let Err(err) = self.store.stage(&outputs) {
                log_failure(self.store.release(reservation.lease), "release reservation");
                return Err(err.into());
            }
        }

        let result = match self.prove(request, &reservation.notes, &outputs).await {
            Ok(proof) => self.submit(request, &proof).await.map_err(Failure::submitted),
            Err(err) => Err(err.into()),
        };

        match result {
            Ok(receipt) => self.complete(request.intent, ids, receipt),
            Err(failure) => {
                self.recover(request, &reservation.notes, reservation.lease, &failure.error)
                    .await;

                match self.settled.lock().remove(&request.intent) {
                    Some(outcome) => {
                        info!(err = %failure.error, "an earlier attempt was accepted");
                        Ok(outcome)
                    }
                    None => Err(failure),
                }
            }
        }
    }

    fn complete(
        &self,
        intent: SpendIntent,
        ids: Vec<NoteId>,
        receipt: SpendReceipt,
    ) -> Result<SpendOutcome, Failure> {
        let mut settled = self.settled.lock();
        if let Some(outcome) = settled.remove(&intent) {
            return Ok(outcome);
        }

        let created = self
            .store
            .complete_spend(&ids, intent, &receipt.leaf_indices)
            .map_err(|err| Failure::submitted(err.into()))?;
        info!(spent = ids.len(), created = created.len(), "spend accepted");

        Ok(SpendOutcome {
            intent,
            receipt,
            spent: ids,
            created,
        })
    }

    /// Pick inputs and output notes, reusing outputs staged by an earlier attempt
    ///
    /// Newly planned outputs are returned unstaged, with `true`
    fn prepare(&self, request: &SpendRequest) -> Result<(Vec<Note>, [Note; 2], bool)> {
        let candidates = self.store.unspent_for(self.owner)?;
        let staged = self.store.staged(request.intent)?;

        if let [target, change] = staged.as_slice() {
            let total = change
                .value
                .checked_add(request.amount)
                .and_then(|total| total.checked_add(request.fee));

            if let Some(inputs) = total.ok().and_then(|total| exact_selection(&candidates, total)) {
                debug!("reusing staged outputs");
                return Ok((inputs, [target.clone(), change.clone()], false));
            }
        }

        if !staged.is_empty() {
            debug!(count = staged.len(), "staged outputs no longer match the notes, replanning");
            self.store.discard_staged(request.intent)?;
        }

        let required = request
            .amount
            .checked_add(request.fee)
            .map_err(|_| Error::InvalidNoteSelection("amount plus fee overflows".to_string()))?;
        let inputs = select_notes(&candidates, required)?;

        let (target_owner, target_value) = match request.kind {
            SpendKind::Transfer { recipient } => (owner_for_address(&recipient), request.amount),
            SpendKind::Withdraw { .. } => (self.owner, Amount::ZERO),
        };

        let outputs = self.assembler.plan_outputs(
            request.intent,
            &inputs,
            self.owner,
            target_owner,
            target_value,
            request.amount,
            request.fee,
            &mut OsRng,
        )?;

        Ok((inputs, outputs, true))
    }

    async fn prove(
        &self,
        request: &SpendRequest,
        inputs: &[Note],
        outputs: &[Note; 2],
    ) -> Result<Proof> {
        let relayer = request
            .relayer
            .map_or(Element::ZERO, |relayer| relayer.to_element());

        let assembled = {
            let replica = self.replica.lock();
            self.assembler.assemble(
                inputs,
                outputs,
                self.owner,
                request.fee,
                relayer,
                &replica.tree,
                &mut OsRng,
            )?
        };

        let timeout = self.config.prover_timeout();
        let proof = tokio::time::timeout(timeout, self.prover.prove(&assembled.inputs))
            .await
            .map_err(|_| Error::ProverTimeout(timeout))??;

        if proof.public_inputs != *assembled.public_inputs() {
            return Err(Error::MalformedProverResponse(
                "public inputs differ from the assembled spend".to_string(),
            ));
        }

        Ok(proof)
    }

    async fn submit(&self, request: &SpendRequest, proof: &Proof) -> Result<SpendReceipt> {
        match request.kind {
            SpendKind::Transfer { .. } => {
                self.ledger
                    .transact(self.address, &proof.bytes, &proof.public_inputs)
                    .await
            }
            SpendKind::Withdraw { recipient } => {
                self.ledger
                    .withdraw(
                        self.address,
                        &proof.bytes,
                        &proof.public_inputs,
                        recipient,
                        request.amount,
                    )
                    .await
            }
        }
    }

    async fn recover(
        &self,
        request: &SpendRequest,
        inputs: &[Note],
        lease: notes::LeaseId,
        err: &Error,
    ) {
        log_failure(self.store.release(lease), "release reservation");

        let Error::Ledger(rejection) = err else {
            return;
        };

        match rejection {
            ledger::Error::NullifierSpent { nullifier, .. } => {
                let spent = inputs
                    .iter()
                    .find(|note| self.assembler.nullifier(note) == Some(*nullifier));
                if let Some(note) = spent {
                    warn!(note = %note.id, "input was already spent on the ledger");
                    log_failure(self.store.mark_spent(note.id), "mark input spent");
                }
            }
            ledger::Error::UnknownRoot { .. } => self.replica.lock().tree.invalidate(),
            _ => {}
        }

        // an earlier attempt of this intent may have been accepted, and sync settles it
        match self.sync().await {
            Ok(_) => log_failure(self.store.discard_staged(request.intent), "discard staged outputs"),
            Err(err) => warn!(%err, "resync after a rejected spend failed, keeping staged outputs"),
        }
    }
}

fn log_failure<T>(result: notes::Result<T>, action: &str) {
    if let Err(err) = result {
        warn!(%err, action, "note store update failed after a failed spend");
    }
}

/// One or two notes whose values add up to exactly `total`
fn exact_selection(candidates: &[Note], total: Amount) -> Option<Vec<Note>> {
    if let Some(note) = candidates.iter().find(|note| note.value == total) {
        return Some(vec![note.clone()]);
    }

    candidates.iter().enumerate().find_map(|(i, first)| {
        candidates[i + 1..]
            .iter()
            .find(|second| first.value.checked_add(second.value) == Ok(total))
            .map(|second| vec![first.clone(), second.clone()])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(value: u128) -> Note {
        let mut note = Note::pending(
            SpendIntent::new(),
            0,
            Amount::new(value),
            Element::ZERO,
            Element::ZERO,
            Element::ZERO,
        );
        note.state = NoteState::Unspent;
        note
    }

    #[test]
    fn exact_selection_matches_sums() {
        let notes = [note(10), note(25), note(40)];

        let single = exact_selection(&notes, Amount::new(25)).unwrap();
        assert_eq!(single[0].id, notes[1].id);

        let pair = exact_selection(&notes, Amount::new(50)).unwrap();
        assert_eq!([pair[0].id, pair[1].id], [notes[0].id, notes[2].id]);

        assert!(exact_selection(&notes, Amount::new(11)).is_none());
    }

    #[test]
    fn requests_pick_up_the_configured_fee() {
        let request = SpendRequest::transfer(Address::from_low_u64_be(2), Amount::new(5))
            .with_fee(Amount::new(1), Address::from_low_u64_be(3));

        assert_eq!(request.fee, Amount::new(1));
        assert_eq!(request.relayer, Some(Address::from_low_u64_be(3)));
        assert_ne!(
            request.intent,
            SpendRequest::transfer(Address::from_low_u64_be(2), Amount::new(5)).intent
        );
    }
}
