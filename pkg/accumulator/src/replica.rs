use tracing::{debug, warn};
use zk_primitives::Element;

use crate::{Error, MerkleAccumulator, MerkleHasher, MerkleProof, PoseidonHasher, Result};

/// Where a [`TreeReplica`] stands relative to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Leaves may be missing, proofs are refused
    Stale,
    /// Leaf events are being applied
    Syncing,
    /// Leaf count and root matched the ledger at the last reconciliation
    Synced {
        /// The root both sides agreed on
        root: Element,
    },
}

/// A client-side mirror of the ledger's tree, rebuilt from its leaf events
///
/// The ledger is the source of truth. The replica applies `LeafInserted` events strictly in
/// leaf-index order and only serves proofs once [`TreeReplica::finish_sync`] has confirmed that
/// its leaf count and root match the ledger's. Any change after that (a new leaf, or an explicit
/// [`TreeReplica::invalidate`]) drops it back out of the synced state.
///
/// ```rust
/// # use accumulator::*;
/// # use zk_primitives::Element;
/// let mut ledger_tree = IncrementalTree::<TREE_DEPTH>::new();
/// let (index, ledger_root) = ledger_tree.insert(Element::new(7)).unwrap();
///
/// let mut replica = TreeReplica::<TREE_DEPTH>::new();
/// assert!(replica.proof(0).is_err());
///
/// replica.begin_sync();
/// replica.apply_leaf(index, Element::new(7)).unwrap();
/// replica.finish_sync(ledger_tree.next_index(), ledger_root).unwrap();
///
/// let proof = replica.proof(0).unwrap();
/// assert_eq!(proof.root, ledger_root);
/// ```
#[derive(Debug, Clone)]
pub struct TreeReplica<const DEPTH: usize, H = PoseidonHasher> {
    tree: MerkleAccumulator<DEPTH, H>,
    state: SyncState,
}

impl<const DEPTH: usize, H: MerkleHasher + Default> TreeReplica<DEPTH, H> {
    /// An empty, stale replica
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<const DEPTH: usize, H: MerkleHasher + Default> Default for TreeReplica<DEPTH, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize, H: MerkleHasher> TreeReplica<DEPTH, H> {
    /// An empty, stale replica using `hasher`
    #[must_use]
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            tree: MerkleAccumulator::with_hasher(hasher),
            state: SyncState::Stale,
        }
    }

    /// The current state
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Whether proofs can be served
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self.state, SyncState::Synced { .. })
    }

    /// The mirrored tree, regardless of sync state
    #[must_use]
    pub fn tree(&self) -> &MerkleAccumulator<DEPTH, H> {
        &self.tree
    }

    /// The number of leaves applied so far, which is also the next index this replica expects
    #[must_use]
    pub fn leaf_count(&self) -> u64 {
        self.tree.leaf_count()
    }

    /// The root over the leaves applied so far
    #[must_use]
    pub fn root(&self) -> Element {
        self.tree.root()
    }

    /// Mark the replica stale, keeping its leaves
    ///
    /// The leaf set never shrinks, so a later sync only needs the events after
    /// [`TreeReplica::leaf_count`]
    pub fn invalidate(&mut self) {
        self.state = SyncState::Stale;
    }

    /// Drop every leaf, for a full rebuild from the first event
    pub fn reset(&mut self) {
        debug!(leaves = self.tree.leaf_count(), "resetting tree replica");

        self.tree.clear();
        self.state = SyncState::Stale;
    }

    /// Start applying leaf events
    pub fn begin_sync(&mut self) {
        self.state = SyncState::Syncing;
    }

    /// Apply one `LeafInserted` event
    ///
    /// Events for leaves that are already present are accepted if they agree, so overlapping
    /// replays are harmless. A gap is an error, and leaves the replica stale.
    pub fn apply_leaf(&mut self, leaf_index: u64, commitment: Element) -> Result<()> {
        let expected = self.tree.leaf_count();

        if leaf_index < expected {
            return match self.tree.leaf(leaf_index) {
                Some(existing) if existing == commitment => Ok(()),
                Some(existing) => {
                    self.state = SyncState::Stale;
                    Err(Error::ConflictingLeaf {
                        index: leaf_index,
                        existing,
                        offered: commitment,
                    })
                }
                None => Ok(()),
            };
        }

        if leaf_index > expected {
            self.state = SyncState::Stale;
            return Err(Error::OutOfOrderLeaf {
                expected,
                got: leaf_index,
            });
        }

        self.tree.insert_leaf(commitment)?;
        if self.is_synced() {
            self.state = SyncState::Syncing;
        }

        Ok(())
    }

    /// Reconcile with the ledger's view after applying events
    ///
    /// `remote_leaf_count` is the ledger's next leaf index and `remote_root` its last root. On
    /// success the replica becomes [`SyncState::Synced`] and the agreed root is returned. On
    /// mismatch it stays stale.
    pub fn finish_sync(&mut self, remote_leaf_count: u64, remote_root: Element) -> Result<Element> {
        let local = self.tree.leaf_count();
        if local != remote_leaf_count {
            warn!(local, remote = remote_leaf_count, "replica leaf count mismatch");
            self.state = SyncState::Stale;
            return Err(Error::LeafCountMismatch {
                local,
                remote: remote_leaf_count,
            });
        }

        let root = self.tree.root();
        if root != remote_root {
            warn!(%root, %remote_root, "replica root mismatch");
            self.state = SyncState::Stale;
            return Err(Error::RootMismatch {
                local: root,
                remote: remote_root,
            });
        }

        debug!(leaves = local, %root, "tree replica synced");
        self.state = SyncState::Synced { root };

        Ok(root)
    }

    /// An inclusion proof against the synced root
    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof<DEPTH>> {
        if !self.is_synced() {
            return Err(Error::NotSynced);
        }

        self.tree.merkle_proof(leaf_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CachedHasher, IncrementalTree, TREE_DEPTH};

    type Replica = TreeReplica<TREE_DEPTH>;

    fn ledger_with(leaves: &[Element]) -> IncrementalTree<TREE_DEPTH> {
        let mut tree = IncrementalTree::new();
        for leaf in leaves {
            tree.insert(*leaf).unwrap();
        }
        tree
    }

    fn synced(leaves: &[Element]) -> Replica {
        let ledger = ledger_with(leaves);
        let mut replica = Replica::new();

        replica.begin_sync();
        for (index, leaf) in leaves.iter().enumerate() {
            replica.apply_leaf(index as u64, *leaf).unwrap();
        }
        replica.finish_sync(ledger.next_index(), ledger.root()).unwrap();

        replica
    }

    #[test]
    fn stale_replicas_refuse_proofs() {
        let mut replica = synced(&[Element::new(1)]);
        assert!(replica.proof(0).is_ok());

        replica.invalidate();
        assert_eq!(replica.proof(0).unwrap_err(), Error::NotSynced);
        assert_eq!(replica.leaf_count(), 1);
    }

    #[test]
    fn new_leaves_require_reconciliation() {
        let mut replica = synced(&[Element::new(1)]);

        replica.apply_leaf(1, Element::new(2)).unwrap();
        assert_eq!(replica.state(), SyncState::Syncing);
        assert_eq!(replica.proof(0).unwrap_err(), Error::NotSynced);

        let ledger = ledger_with(&[Element::new(1), Element::new(2)]);
        replica.finish_sync(2, ledger.root()).unwrap();
        assert!(replica.proof(1).is_ok());
    }

    #[test]
    fn gaps_are_rejected() {
        let mut replica = Replica::new();
        replica.begin_sync();

        assert_eq!(
            replica.apply_leaf(1, Element::ONE).unwrap_err(),
            Error::OutOfOrderLeaf {
                expected: 0,
                got: 1
            }
        );
        assert_eq!(replica.state(), SyncState::Stale);
    }

    #[test]
    fn replayed_leaves_are_idempotent_but_checked() {
        let mut replica = synced(&[Element::new(1), Element::new(2)]);
        replica.begin_sync();

        replica.apply_leaf(0, Element::new(1)).unwrap();
        assert_eq!(replica.leaf_count(), 2);

        assert!(matches!(
            replica.apply_leaf(1, Element::new(99)),
            Err(Error::ConflictingLeaf { index: 1, .. })
        ));
    }

    #[test]
    fn mismatches_leave_the_replica_stale() {
        let mut replica = Replica::new();
        replica.begin_sync();
        replica.apply_leaf(0, Element::new(1)).unwrap();

        let ledger = ledger_with(&[Element::new(1), Element::new(2)]);
        assert_eq!(
            replica.finish_sync(ledger.next_index(), ledger.root()),
            Err(Error::LeafCountMismatch {
                local: 1,
                remote: 2
            })
        );

        let other = ledger_with(&[Element::new(5)]);
        assert!(matches!(
            replica.finish_sync(1, other.root()),
            Err(Error::RootMismatch { .. })
        ));
        assert!(!replica.is_synced());
    }

    #[test]
    fn reset_forgets_leaves() {
        let mut replica = synced(&[Element::new(1), Element::new(2)]);
        replica.reset();

        assert_eq!(replica.leaf_count(), 0);
        assert_eq!(replica.state(), SyncState::Stale);
        assert_eq!(replica.root(), Replica::new().root());
    }

    #[test]
    fn repeated_proofs_are_served_from_the_hash_cache() {
        let leaves: Vec<_> = (1..=5).map(Element::new).collect();
        let ledger = ledger_with(&leaves);
        let hasher = CachedHasher::default();
        let mut replica = TreeReplica::<TREE_DEPTH, _>::with_hasher(hasher.clone());

        replica.begin_sync();
        for (index, leaf) in leaves.iter().enumerate() {
            replica.apply_leaf(index as u64, *leaf).unwrap();
        }
        replica.finish_sync(ledger.next_index(), ledger.root()).unwrap();

        let before = hasher.stats();
        let first = replica.proof(3).unwrap();
        let cold = hasher.stats().since(before);

        let before = hasher.stats();
        let second = replica.proof(3).unwrap();
        let warm = hasher.stats().since(before);

        assert_eq!(first, second);
        assert_eq!(first.root, ledger.root());
        assert!(cold.lookups() > 0);
        assert_eq!(warm.misses, 0);
        assert_eq!(warm.hits, cold.lookups());
    }
}
