use zk_primitives::Element;

/// Errors from building, syncing or querying a commitment tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A proof was requested for a leaf that has not been inserted
    #[error("leaf index {index} out of range ({leaf_count} leaves)")]
    IndexOutOfRange {
        /// The requested index
        index: u64,
        /// The number of leaves in the tree
        leaf_count: u64,
    },

    /// Every leaf slot is occupied
    #[error("tree is full ({capacity} leaves)")]
    TreeFull {
        /// `2^DEPTH`
        capacity: u64,
    },

    /// A leaf event arrived with a gap before it
    #[error("expected leaf {expected}, got leaf {got}")]
    OutOfOrderLeaf {
        /// The next index the replica can accept
        expected: u64,
        /// The index that was offered
        got: u64,
    },

    /// A replayed leaf event disagrees with a leaf that was already applied
    #[error("conflicting commitment for leaf {index}: have {existing}, got {offered}")]
    ConflictingLeaf {
        /// The leaf index
        index: u64,
        /// The commitment already in the tree
        existing: Element,
        /// The commitment from the event
        offered: Element,
    },

    /// After replay, the replica and the ledger disagree on the number of leaves
    #[error("replica has {local} leaves, ledger has {remote}")]
    LeafCountMismatch {
        /// Leaves in the replica
        local: u64,
        /// The ledger's next leaf index
        remote: u64,
    },

    /// After replay, the replica and the ledger disagree on the root
    #[error("replica root {local} does not match ledger root {remote}")]
    RootMismatch {
        /// The replica's root
        local: Element,
        /// The ledger's last root
        remote: Element,
    },

    /// The replica has not been reconciled with the ledger since it last changed
    #[error("tree replica is not synced")]
    NotSynced,
}
