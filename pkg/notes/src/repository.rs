use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::{Note, NoteId, Result};

/// Durable storage for notes
///
/// [`NoteStore`](crate::NoteStore) owns all lifecycle rules. A repository only needs to store
/// whole notes by id, and to apply [`NoteRepository::put_all`] atomically.
pub trait NoteRepository: Send + Sync + 'static {
    fn get(&self, id: NoteId) -> Result<Option<Note>>;

    fn put(&self, note: &Note) -> Result<()> {
        self.put_all(std::slice::from_ref(note))
    }

    /// Store every note, or none of them
    fn put_all(&self, notes: &[Note]) -> Result<()>;

    fn remove(&self, id: NoteId) -> Result<()>;

    fn list(&self) -> Result<Vec<Note>>;
}

/// An in-memory repository, for tests and short-lived tools
#[derive(Debug, Default)]
pub struct MemoryRepository {
    notes: RwLock<BTreeMap<NoteId, Note>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteRepository for MemoryRepository {
    fn get(&self, id: NoteId) -> Result<Option<Note>> {
        Ok(self.notes.read().get(&id).cloned())
    }

    fn put_all(&self, notes: &[Note]) -> Result<()> {
        let mut guard = self.notes.write();
        for note in notes {
            guard.insert(note.id, note.clone());
        }

        Ok(())
    }

    fn remove(&self, id: NoteId) -> Result<()> {
        self.notes.write().remove(&id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<Note>> {
        Ok(self.notes.read().values().cloned().collect())
    }
}
