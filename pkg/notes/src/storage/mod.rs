//! A [`NoteRepository`] backed by rocksdb

use std::path::Path;

use rocksdb::{Direction, IteratorMode, WriteBatch, DB};

use crate::{Error, Note, NoteId, NoteRepository, Result};

use self::format::{note_key, note_prefix, StoredNote};

mod format;


/// Notes persisted in a rocksdb instance
///
/// ```rust
/// # use notes::{storage::RocksRepository, NoteStore};
/// # let dir = tempdir::TempDir::new("notes_doctest").unwrap();
/// # let path = dir.path().join("db");
/// let store = NoteStore::new(RocksRepository::open(&path).unwrap());
/// # drop(store);
/// ```
pub struct RocksRepository {
    db: DB,
}

impl RocksRepository {
    /// Open (or create) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = DB::open_default(path)?;
        Ok(Self { db })
    }

    /// The underlying rocksdb handle
    #[must_use]
    pub fn db(&self) -> &DB {
        &self.db
    }
}

impl NoteRepository for RocksRepository {
    fn get(&self, id: NoteId) -> Result<Option<Note>> {
        self.db
            .get(note_key(id))?
            .map(|bytes| StoredNote::from_bytes(&bytes)?.into_note())
            .transpose()
    }

    fn put_all(&self, notes: &[Note]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for note in notes {
            batch.put(note_key(note.id), StoredNote::from(note).to_bytes()?);
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn remove(&self, id: NoteId) -> Result<()> {
        self.db.delete(note_key(id))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<Note>> {
        let prefix = note_prefix();
        let mut notes = Vec::new();

        for item in self.db.iterator(IteratorMode::From(&prefix, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            let note = StoredNote::from_bytes(&value)?.into_note()?;
            if note_key(note.id)[..] != key[..] {
                return Err(Error::DatabaseConsistency(format!(
                    "note {} stored under the wrong key",
                    note.id
                )));
            }

            notes.push(note);
        }

        Ok(notes)
    }
}
