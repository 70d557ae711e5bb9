use primitives::{Address, Amount};
use serde::{Deserialize, Serialize};
use zk_primitives::Element;

/// Everything the ledger emits, in emission order
///
/// Leaf insertions are emitted as their own [`LedgerEvent::LeafInserted`] events, ahead of the
/// operation event that caused them, so replicas can rebuild the tree from those alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deposit {
        commitment: Element,
        leaf_index: u64,
        amount: Amount,
    },
    Transact {
        nullifiers: [Element; 2],
        commitments: [Element; 2],
        encrypted_values: [Element; 2],
    },
    Withdrawal {
        nullifier: Element,
        to: Address,
        amount: Amount,
    },
    LeafInserted {
        commitment: Element,
        leaf_index: u64,
    },
}

impl LedgerEvent {
    /// The `(leaf_index, commitment)` pair, for leaf insertions
    #[must_use]
    pub fn leaf(&self) -> Option<(u64, Element)> {
        match *self {
            Self::LeafInserted {
                commitment,
                leaf_index,
            } => Some((leaf_index, commitment)),
            _ => None,
        }
    }
}

/// A position in the event log
///
/// Cursors are plain offsets. The log is append-only, so a cursor stays valid forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventCursor(pub u64);

impl EventCursor {
    pub const START: Self = Self(0);
}

#[derive(Debug, Default)]
pub(crate) struct EventLog {
    events: Vec<LedgerEvent>,
}

impl EventLog {
    pub(crate) fn extend(&mut self, events: impl IntoIterator<Item = LedgerEvent>) {
        self.events.extend(events);
    }

    pub(crate) fn since(&self, cursor: EventCursor) -> (&[LedgerEvent], EventCursor) {
        let start = usize::try_from(cursor.0)
            .unwrap_or(usize::MAX)
            .min(self.events.len());

        (&self.events[start..], self.head())
    }

    pub(crate) fn head(&self) -> EventCursor {
        EventCursor(self.events.len() as u64)
    }
}
