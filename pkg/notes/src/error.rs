use crate::{LeaseId, NoteId, NoteState};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown note: {0}")]
    UnknownNote(NoteId),

    #[error("note {id} cannot be reserved in state {state:?}")]
    NotSpendable { id: NoteId, state: NoteState },

    #[error("note {0} was selected more than once")]
    DuplicateNote(NoteId),

    #[error("unknown or expired lease: {0}")]
    UnknownLease(LeaseId),

    #[error("note {id} is not pending (state {state:?})")]
    NotPending { id: NoteId, state: NoteState },

    #[error("lease duration out of range")]
    LeaseOutOfRange,

    #[cfg(feature = "storage")]
    #[error("rocksdb error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    #[error("note encoding error: {0}")]
    Encoding(#[from] std::io::Error),

    #[error("the note database contained inconsistent data: {0}")]
    DatabaseConsistency(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
