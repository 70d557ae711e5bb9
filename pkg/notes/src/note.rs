use std::fmt;

use chrono::{DateTime, Utc};
use primitives::{Address, Amount};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zk_primitives::Element;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifies a note in the local store
    NoteId
);
uuid_id!(
    /// Identifies one reservation of a set of notes
    LeaseId
);
uuid_id!(
    /// Identifies one logical deposit or spend, across retries
    ///
    /// Output notes are staged under the intent before proving, so a retry after a cancelled or
    /// failed proof reuses the same secrets.
    SpendIntent
);

/// Where a note is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NoteState {
    /// Staged by `intent`, waiting for the ledger to confirm its leaf
    Pending {
        /// The deposit or spend that created this note
        intent: SpendIntent,
        /// The output position within the intent, which is also the order its leaf is inserted
        slot: u8,
    },
    /// Confirmed and available to spend
    Unspent,
    /// Held by an in-flight spend until the lease is committed, released or expires
    Reserved {
        /// The reservation holding this note
        lease: LeaseId,
        /// When the reservation lapses
        expires_at: DateTime<Utc>,
    },
    /// The ledger accepted this note's nullifier
    Spent,
}

/// A note: a commitment in the pool's tree plus the secrets needed to spend it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Local identifier
    pub id: NoteId,
    /// The amount this note carries
    pub value: Amount,
    /// The spending secret, never revealed on the ledger
    pub secret: Element,
    /// The owner field, see [`owner_for_address`]
    pub owner: Element,
    /// The commitment inserted into the tree, produced by the circuit from
    /// `(value, secret, owner)`
    pub commitment: Element,
    /// The leaf index, known once the ledger has inserted the commitment
    pub leaf_index: Option<u64>,
    /// The key `value` was encrypted to, for outputs of a spend
    pub viewing_key: Option<Element>,
    /// Lifecycle state
    pub state: NoteState,
    /// When the note was first stored
    pub created_at: DateTime<Utc>,
}

impl Note {
    /// A note staged under `intent`, not yet in the tree
    #[must_use]
    pub fn pending(
        intent: SpendIntent,
        slot: u8,
        value: Amount,
        secret: Element,
        owner: Element,
        commitment: Element,
    ) -> Self {
        Self {
            id: NoteId::new(),
            value,
            secret,
            owner,
            commitment,
            leaf_index: None,
            viewing_key: None,
            state: NoteState::Pending { intent, slot },
            created_at: Utc::now(),
        }
    }

    /// Attach the viewing key its value was encrypted to
    #[must_use]
    pub fn with_viewing_key(mut self, viewing_key: Element) -> Self {
        self.viewing_key = Some(viewing_key);
        self
    }

    /// Whether the ledger has accepted this note's nullifier
    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.state == NoteState::Spent
    }

    /// Whether this note can be reserved at `now`
    ///
    /// Reserved notes whose lease has lapsed count as unspent
    #[must_use]
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            NoteState::Unspent => true,
            NoteState::Reserved { expires_at, .. } => expires_at <= now,
            NoteState::Pending { .. } | NoteState::Spent => false,
        }
    }

    /// Whether this note was staged by `intent` and is still waiting for confirmation
    #[must_use]
    pub fn is_staged_by(&self, intent: SpendIntent) -> bool {
        matches!(self.state, NoteState::Pending { intent: staged, .. } if staged == intent)
    }

    /// The output slot, for staged notes
    #[must_use]
    pub fn slot(&self) -> Option<u8> {
        match self.state {
            NoteState::Pending { slot, .. } => Some(slot),
            _ => None,
        }
    }
}

/// The owner field for notes held by `address`
///
/// The address read as a big-endian integer. Anyone who knows a holder's address can compute it,
/// which is what lets a sender create a note for a recipient.
#[must_use]
pub fn owner_for_address(address: &Address) -> Element {
    address.to_element()
}
