use std::collections::HashSet;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};
use zk_primitives::Element;

use crate::{
    Error, LeaseId, MemoryRepository, Note, NoteId, NoteRepository, NoteState, Result,
    SpendIntent,
};

/// Notes held under one lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub lease: LeaseId,
    pub expires_at: DateTime<Utc>,
    /// The reserved notes, in the order they were requested
    pub notes: Vec<Note>,
}

/// The lifecycle rules for a holder's notes, over an injected [`NoteRepository`]
///
/// Every read-modify-write happens under one lock, so two spends racing for the same note
/// cannot both reserve it.
pub struct NoteStore<R = MemoryRepository> {
    repo: R,
    write_lock: Mutex<()>,
}

impl NoteStore<MemoryRepository> {
    /// A store backed by a fresh [`MemoryRepository`]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryRepository::new())
    }
}

impl<R: NoteRepository> NoteStore<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn save(&self, note: &Note) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.repo.put(note)
    }

    pub fn get(&self, id: NoteId) -> Result<Note> {
        self.repo.get(id)?.ok_or(Error::UnknownNote(id))
    }

    /// Mark a note spent
    ///
    /// Calling this on a note that is already spent does nothing
    pub fn mark_spent(&self, id: NoteId) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut note = self.get(id)?;
        if note.is_spent() {
            return Ok(());
        }

        note.state = NoteState::Spent;
        self.repo.put(&note)
    }

    /// Spendable notes owned by `owner`, in leaf order
    ///
    /// Includes reserved notes whose lease has lapsed
    pub fn unspent_for(&self, owner: Element) -> Result<Vec<Note>> {
        let now = Utc::now();
        let mut notes: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .filter(|note| note.owner == owner && note.is_available(now))
            .collect();

        notes.sort_by_key(|note| note.leaf_index);
        Ok(notes)
    }

    /// Every note owned by `owner` in any state, oldest first
    pub fn all_for(&self, owner: Element) -> Result<Vec<Note>> {
        let mut notes: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .filter(|note| note.owner == owner)
            .collect();

        notes.sort_by_key(|note| (note.created_at, note.leaf_index));
        Ok(notes)
    }

    /// Reserve `ids` for one spend until `now + lease_for`
    ///
    /// Fails without reserving anything if any note is unknown, listed twice, or not available
    pub fn reserve(
        &self,
        ids: &[NoteId],
        lease_for: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<Reservation> {
        let lease_for = chrono::Duration::from_std(lease_for).map_err(|_| Error::LeaseOutOfRange)?;
        let expires_at = now
            .checked_add_signed(lease_for)
            .ok_or(Error::LeaseOutOfRange)?;

        let _guard = self.write_lock.lock();

        let mut seen = HashSet::new();
        let mut notes = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(*id) {
                return Err(Error::DuplicateNote(*id));
            }

            let note = self.get(*id)?;
            if !note.is_available(now) {
                return Err(Error::NotSpendable {
                    id: *id,
                    state: note.state,
                });
            }

            notes.push(note);
        }

        let lease = LeaseId::new();
        for note in &mut notes {
            note.state = NoteState::Reserved { lease, expires_at };
        }

        self.repo.put_all(&notes)?;
        debug!(%lease, notes = notes.len(), %expires_at, "reserved notes");

        Ok(Reservation {
            lease,
            expires_at,
            notes,
        })
    }

    /// Return the notes held by `lease` to [`NoteState::Unspent`]
    ///
    /// Returns how many notes were released. Notes already reclaimed by another lease are left
    /// alone.
    pub fn release(&self, lease: LeaseId) -> Result<usize> {
        let _guard = self.write_lock.lock();

        let mut held = self.held_by(lease)?;
        for note in &mut held {
            note.state = NoteState::Unspent;
        }

        self.repo.put_all(&held)?;
        debug!(%lease, notes = held.len(), "released reservation");

        Ok(held.len())
    }

    /// Return lapsed reservations to [`NoteState::Unspent`]
    ///
    /// Returns the earliest expiry still in the future, if any
    pub fn expire_leases(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let _guard = self.write_lock.lock();

        let mut expired = Vec::new();
        let mut next = None;

        for mut note in self.repo.list()? {
            let NoteState::Reserved { expires_at, .. } = note.state else {
                continue;
            };

            if expires_at <= now {
                note.state = NoteState::Unspent;
                expired.push(note);
            } else {
                next = Some(next.map_or(expires_at, |next: DateTime<Utc>| next.min(expires_at)));
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "expired note reservations");
            self.repo.put_all(&expired)?;
        }

        Ok(next)
    }

    /// Notes staged by `intent` that are still pending, in slot order
    pub fn staged(&self, intent: SpendIntent) -> Result<Vec<Note>> {
        let mut notes: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .filter(|note| note.is_staged_by(intent))
            .collect();

        notes.sort_by_key(Note::slot);
        Ok(notes)
    }

    /// Every pending note, grouped by intent and in slot order within each intent
    pub fn pending(&self) -> Result<Vec<Note>> {
        let mut notes: Vec<_> = self
            .repo
            .list()?
            .into_iter()
            .filter(|note| matches!(note.state, NoteState::Pending { .. }))
            .collect();

        notes.sort_by_key(|note| match note.state {
            NoteState::Pending { intent, slot } => Some((intent, slot)),
            _ => None,
        });
        Ok(notes)
    }

    /// Persist output notes before their leaves exist
    ///
    /// Every note must be [`NoteState::Pending`]
    pub fn stage(&self, notes: &[Note]) -> Result<()> {
        if let Some(note) = notes
            .iter()
            .find(|note| !matches!(note.state, NoteState::Pending { .. }))
        {
            return Err(Error::NotPending {
                id: note.id,
                state: note.state,
            });
        }

        let _guard = self.write_lock.lock();
        self.repo.put_all(notes)
    }

    /// Record the leaf index the ledger gave a pending note
    ///
    /// Confirming an already-confirmed note at the same index is a no-op
    pub fn confirm(&self, id: NoteId, leaf_index: u64) -> Result<Note> {
        let _guard = self.write_lock.lock();

        let mut note = self.get(id)?;
        match note.state {
            NoteState::Pending { .. } => {}
            _ if note.leaf_index == Some(leaf_index) => return Ok(note),
            state => return Err(Error::NotPending { id, state }),
        }

        note.leaf_index = Some(leaf_index);
        note.state = NoteState::Unspent;
        self.repo.put(&note)?;

        Ok(note)
    }

    /// Apply an accepted spend in one write
    ///
    /// `inputs` become spent. The notes staged by `intent` take `leaf_indices` in slot order and
    /// become unspent, except zero-value outputs, which carry nothing and are dropped.
    pub fn complete_spend(
        &self,
        inputs: &[NoteId],
        intent: SpendIntent,
        leaf_indices: &[u64],
    ) -> Result<Vec<Note>> {
        let _guard = self.write_lock.lock();

        let staged = self.staged(intent)?;
        if staged.len() != leaf_indices.len() {
            return Err(Error::DatabaseConsistency(format!(
                "intent {intent} has {} staged outputs, ledger inserted {}",
                staged.len(),
                leaf_indices.len()
            )));
        }

        let mut updates = Vec::with_capacity(inputs.len() + staged.len());
        for id in inputs {
            let mut note = self.get(*id)?;
            note.state = NoteState::Spent;
            updates.push(note);
        }

        let mut confirmed = Vec::new();
        let mut dropped = Vec::new();
        for (mut note, leaf_index) in staged.into_iter().zip(leaf_indices) {
            note.leaf_index = Some(*leaf_index);
            note.state = NoteState::Unspent;

            if note.value.is_zero() {
                dropped.push(note.id);
            } else {
                confirmed.push(note.clone());
                updates.push(note);
            }
        }

        self.repo.put_all(&updates)?;
        for id in dropped {
            self.repo.remove(id)?;
        }

        info!(%intent, spent = inputs.len(), created = confirmed.len(), "spend settled");
        Ok(confirmed)
    }

    /// Delete the notes staged by `intent`
    ///
    /// Only for spends the ledger definitively rejected. A cancelled or failed proof is not a
    /// rejection: keep the staged notes so the retry reuses them.
    pub fn discard_staged(&self, intent: SpendIntent) -> Result<usize> {
        let _guard = self.write_lock.lock();

        let staged = self.staged(intent)?;
        for note in &staged {
            self.repo.remove(note.id)?;
        }

        Ok(staged.len())
    }

    fn held_by(&self, lease: LeaseId) -> Result<Vec<Note>> {
        Ok(self
            .repo
            .list()?
            .into_iter()
            .filter(|note| {
                matches!(note.state, NoteState::Reserved { lease: held, .. } if held == lease)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use primitives::Amount;

    use super::*;

    const LEASE: Duration = Duration::from_secs(60);

    fn unspent(store: &NoteStore, owner: u64, value: u128, leaf_index: u64) -> Note {
        let mut note = Note::pending(
            SpendIntent::new(),
            0,
            Amount::new(value),
            Element::new(leaf_index + 100),
            Element::new(owner),
            Element::new(leaf_index + 1000),
        );
        note.owner = Element::new(owner);
        note.leaf_index = Some(leaf_index);
        note.state = NoteState::Unspent;

        store.save(&note).unwrap();
        note
    }

    fn staged_pair(store: &NoteStore, intent: SpendIntent, values: [u128; 2]) -> Vec<Note> {
        let notes: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(slot, value)| {
                Note::pending(
                    intent,
                    slot as u8,
                    Amount::new(*value),
                    Element::new(slot as u64 + 7),
                    Element::new(1),
                    Element::new(slot as u64 + 70),
                )
            })
            .collect();

        store.stage(&notes).unwrap();
        notes
    }

    #[test]
    fn unspent_for_filters_by_owner_and_state() {
        let store = NoteStore::in_memory();
        let a = unspent(&store, 1, 10, 0);
        let b = unspent(&store, 1, 20, 1);
        unspent(&store, 2, 30, 2);

        store.mark_spent(a.id).unwrap();

        let notes = store.unspent_for(Element::new(1)).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, b.id);

        assert_eq!(store.all_for(Element::new(1)).unwrap().len(), 2);
    }

    #[test]
    fn mark_spent_is_idempotent() {
        let store = NoteStore::in_memory();
        let note = unspent(&store, 1, 10, 0);

        store.mark_spent(note.id).unwrap();
        store.mark_spent(note.id).unwrap();

        assert!(store.get(note.id).unwrap().is_spent());
        assert!(matches!(
            store.mark_spent(NoteId::new()),
            Err(Error::UnknownNote(_))
        ));
    }

    #[test]
    fn reserved_notes_cannot_be_reserved_again() {
        let store = NoteStore::in_memory();
        let note = unspent(&store, 1, 10, 0);
        let now = Utc::now();

        let reservation = store.reserve(&[note.id], LEASE, now).unwrap();
        assert_eq!(reservation.notes.len(), 1);

        assert!(matches!(
            store.reserve(&[note.id], LEASE, now),
            Err(Error::NotSpendable { .. })
        ));
        assert!(store.unspent_for(Element::new(1)).unwrap().is_empty());

        assert_eq!(store.release(reservation.lease).unwrap(), 1);
        assert!(store.reserve(&[note.id], LEASE, now).is_ok());
    }

    #[test]
    fn failed_reservations_reserve_nothing() {
        let store = NoteStore::in_memory();
        let a = unspent(&store, 1, 10, 0);
        let b = unspent(&store, 1, 10, 1);
        store.mark_spent(b.id).unwrap();

        assert!(store.reserve(&[a.id, b.id], LEASE, Utc::now()).is_err());
        assert_eq!(store.get(a.id).unwrap().state, NoteState::Unspent);

        assert!(matches!(
            store.reserve(&[a.id, a.id], LEASE, Utc::now()),
            Err(Error::DuplicateNote(_))
        ));
    }

    #[test]
    fn lapsed_leases_expire() {
        let store = NoteStore::in_memory();
        let a = unspent(&store, 1, 10, 0);
        let b = unspent(&store, 1, 10, 1);
        let now = Utc::now();

        store.reserve(&[a.id], Duration::from_secs(10), now).unwrap();
        store.reserve(&[b.id], Duration::from_secs(100), now).unwrap();

        let later = now + chrono::Duration::seconds(20);

        // a lapsed lease can be reclaimed before the reaper runs
        assert!(store.get(a.id).unwrap().is_available(later));

        let next = store.expire_leases(later).unwrap();
        assert_eq!(next, Some(now + chrono::Duration::seconds(100)));
        assert_eq!(store.get(a.id).unwrap().state, NoteState::Unspent);
        assert!(matches!(
            store.get(b.id).unwrap().state,
            NoteState::Reserved { .. }
        ));
    }

    #[test]
    fn staged_outputs_survive_for_retries() {
        let store = NoteStore::in_memory();
        let intent = SpendIntent::new();
        let notes = staged_pair(&store, intent, [5, 0]);

        let again = store.staged(intent).unwrap();
        assert_eq!(again, notes);
        assert!(store.staged(SpendIntent::new()).unwrap().is_empty());
    }

    #[test]
    fn completing_a_spend_settles_inputs_and_outputs() {
        let store = NoteStore::in_memory();
        let input = unspent(&store, 1, 5, 0);
        let intent = SpendIntent::new();
        let outputs = staged_pair(&store, intent, [5, 0]);

        let confirmed = store.complete_spend(&[input.id], intent, &[1, 2]).unwrap();

        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, outputs[0].id);
        assert_eq!(confirmed[0].leaf_index, Some(1));
        assert!(store.get(input.id).unwrap().is_spent());

        // zero-value change is not kept
        assert!(matches!(
            store.get(outputs[1].id),
            Err(Error::UnknownNote(_))
        ));
        assert!(store.staged(intent).unwrap().is_empty());
    }

    #[test]
    fn confirm_is_idempotent_for_the_same_leaf() {
        let store = NoteStore::in_memory();
        let intent = SpendIntent::new();
        let note = staged_pair(&store, intent, [5, 6]).remove(0);

        store.confirm(note.id, 3).unwrap();
        store.confirm(note.id, 3).unwrap();

        assert!(matches!(
            store.confirm(note.id, 4),
            Err(Error::NotPending { .. })
        ));
    }

    #[test]
    fn discarding_removes_only_that_intent() {
        let store = NoteStore::in_memory();
        let kept = SpendIntent::new();
        let dropped = SpendIntent::new();
        staged_pair(&store, kept, [1, 2]);
        staged_pair(&store, dropped, [3, 4]);

        assert_eq!(store.discard_staged(dropped).unwrap(), 2);
        assert_eq!(store.staged(kept).unwrap().len(), 2);
    }

    /// A repository whose listings take long enough for another writer to interleave
    struct SlowListing {
        inner: MemoryRepository,
        delay: Duration,
    }

    impl NoteRepository for SlowListing {
        fn get(&self, id: NoteId) -> Result<Option<Note>> {
            self.inner.get(id)
        }

        fn put_all(&self, notes: &[Note]) -> Result<()> {
            self.inner.put_all(notes)
        }

        fn remove(&self, id: NoteId) -> Result<()> {
            self.inner.remove(id)
        }

        fn list(&self) -> Result<Vec<Note>> {
            let notes = self.inner.list()?;
            std::thread::sleep(self.delay);
            Ok(notes)
        }
    }

    #[test]
    fn discard_cannot_delete_outputs_settled_meanwhile() {
        let store = NoteStore::new(SlowListing {
            inner: MemoryRepository::new(),
            delay: Duration::from_millis(100),
        });
        let intent = SpendIntent::new();
        let outputs: Vec<_> = (0..2u8)
            .map(|slot| {
                Note::pending(
                    intent,
                    slot,
                    Amount::new(u128::from(slot) + 1),
                    Element::new(u64::from(slot) + 7),
                    Element::new(1),
                    Element::new(u64::from(slot) + 70),
                )
            })
            .collect();
        store.stage(&outputs).unwrap();

        let discarded = std::thread::scope(|scope| {
            let settle = scope.spawn(|| store.complete_spend(&[], intent, &[4, 5]));
            std::thread::sleep(Duration::from_millis(20));
            let discard = scope.spawn(|| store.discard_staged(intent));

            assert_eq!(settle.join().unwrap().unwrap().len(), 2);
            discard.join().unwrap().unwrap()
        });

        assert_eq!(discarded, 0);
        for (note, leaf_index) in outputs.iter().zip([4, 5]) {
            let stored = store.get(note.id).unwrap();
            assert_eq!(stored.state, NoteState::Unspent);
            assert_eq!(stored.leaf_index, Some(leaf_index));
        }
    }

    #[test]
    fn pending_lists_every_staged_output() {
        let store = NoteStore::in_memory();
        let first = SpendIntent::new();
        let second = SpendIntent::new();
        staged_pair(&store, first, [1, 2]);
        staged_pair(&store, second, [3, 4]);
        unspent(&store, 1, 9, 0);

        let pending = store.pending().unwrap();
        assert_eq!(pending.len(), 4);
        assert!(pending.iter().all(|note| note.leaf_index.is_none()));
        for pair in pending.chunks(2) {
            assert_eq!(pair[0].slot(), Some(0));
            assert_eq!(pair[1].slot(), Some(1));
            assert!(pair[1].is_staged_by(match pair[0].state {
                NoteState::Pending { intent, .. } => intent,
                _ => unreachable!(),
            }));
        }
    }

    #[test]
    fn stage_rejects_confirmed_notes() {
        let store = NoteStore::in_memory();
        let note = unspent(&store, 1, 1, 0);

        assert!(matches!(
            store.stage(&[note]),
            Err(Error::NotPending { .. })
        ));
    }
}
