use borsh::{BorshDeserialize, BorshSerialize};
use chrono::{DateTime, Utc};
use primitives::Amount;
use zk_primitives::Element;

use crate::{Error, LeaseId, Note, NoteId, NoteState, Result, SpendIntent};

/// Keys are a one-byte table tag followed by the note id
const NOTE_TAG: u8 = 1;

pub(super) fn note_key(id: NoteId) -> [u8; 17] {
    let mut key = [0; 17];
    key[0] = NOTE_TAG;
    key[1..].copy_from_slice(id.as_bytes());
    key
}

pub(super) fn note_prefix() -> [u8; 1] {
    [NOTE_TAG]
}

/// Every value ever written, by format version
///
/// New versions are added at the end and older ones upgraded on read
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub(super) enum StoredNote {
    V1(NoteV1),
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
pub(super) struct NoteV1 {
    id: [u8; 16],
    value: Amount,
    secret: Element,
    owner: Element,
    commitment: Element,
    leaf_index: Option<u64>,
    viewing_key: Option<Element>,
    state: StateV1,
    created_at_millis: i64,
}

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
enum StateV1 {
    Pending { intent: [u8; 16], slot: u8 },
    Unspent,
    Reserved { lease: [u8; 16], expires_at_millis: i64 },
    Spent,
}

impl StoredNote {
    pub(super) fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(borsh::to_vec(self)?)
    }

    pub(super) fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(borsh::from_slice(bytes)?)
    }

    pub(super) fn into_note(self) -> Result<Note> {
        match self {
            Self::V1(v1) => v1.into_note(),
        }
    }
}

impl From<&Note> for StoredNote {
    fn from(note: &Note) -> Self {
        let state = match note.state {
            NoteState::Pending { intent, slot } => StateV1::Pending {
                intent: *intent.as_bytes(),
                slot,
            },
            NoteState::Unspent => StateV1::Unspent,
            NoteState::Reserved { lease, expires_at } => StateV1::Reserved {
                lease: *lease.as_bytes(),
                expires_at_millis: expires_at.timestamp_millis(),
            },
            NoteState::Spent => StateV1::Spent,
        };

        Self::V1(NoteV1 {
            id: *note.id.as_bytes(),
            value: note.value,
            secret: note.secret,
            owner: note.owner,
            commitment: note.commitment,
            leaf_index: note.leaf_index,
            viewing_key: note.viewing_key,
            state,
            created_at_millis: note.created_at.timestamp_millis(),
        })
    }
}

impl NoteV1 {
    fn into_note(self) -> Result<Note> {
        let state = match self.state {
            StateV1::Pending { intent, slot } => NoteState::Pending {
                intent: SpendIntent::from_bytes(intent),
                slot,
            },
            StateV1::Unspent => NoteState::Unspent,
            StateV1::Reserved {
                lease,
                expires_at_millis,
            } => NoteState::Reserved {
                lease: LeaseId::from_bytes(lease),
                expires_at: timestamp(expires_at_millis)?,
            },
            StateV1::Spent => NoteState::Spent,
        };

        Ok(Note {
            id: NoteId::from_bytes(self.id),
            value: self.value,
            secret: self.secret,
            owner: self.owner,
            commitment: self.commitment,
            leaf_index: self.leaf_index,
            viewing_key: self.viewing_key,
            state,
            created_at: timestamp(self.created_at_millis)?,
        })
    }
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::DatabaseConsistency(format!("timestamp out of range: {millis}")))
}
