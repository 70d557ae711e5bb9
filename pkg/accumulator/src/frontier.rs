use std::sync::Arc;

use zk_primitives::Element;

use crate::{Error, MerkleHasher, PoseidonHasher, Result};

/// An append-only tree that only remembers its rightmost path
///
/// This is the ledger's authoritative tree. It stores one "filled subtree" hash per level, which is
/// enough to compute each new root in `DEPTH` hashes, but it cannot produce proofs for old leaves.
/// Its roots are identical to a [`MerkleAccumulator`](crate::MerkleAccumulator) holding the same
/// leaves.
#[derive(Debug, Clone)]
pub struct IncrementalTree<const DEPTH: usize, H = PoseidonHasher> {
    filled: [Element; DEPTH],
    next_index: u64,
    root: Element,
    zeros: Arc<[Element]>,
    hasher: H,
}

impl<const DEPTH: usize, H: MerkleHasher + Default> IncrementalTree<DEPTH, H> {
    /// An empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<const DEPTH: usize, H: MerkleHasher + Default> Default for IncrementalTree<DEPTH, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize, H: MerkleHasher> IncrementalTree<DEPTH, H> {
    /// The maximum number of leaves, `2^DEPTH`
    pub const CAPACITY: u64 = 1 << DEPTH;

    /// An empty tree using `hasher` for its nodes
    #[must_use]
    pub fn with_hasher(hasher: H) -> Self {
        let zeros = hasher.zero_hashes(DEPTH);

        Self {
            filled: core::array::from_fn(|level| zeros[level]),
            next_index: 0,
            root: zeros[DEPTH],
            zeros,
            hasher,
        }
    }

    /// Append a leaf, returning its index and the new root
    pub fn insert(&mut self, leaf: Element) -> Result<(u64, Element)> {
        let index = self.next_index;
        if index >= Self::CAPACITY {
            return Err(Error::TreeFull {
                capacity: Self::CAPACITY,
            });
        }

        let mut position = index;
        let mut node = leaf;

        for level in 0..DEPTH {
            node = if position % 2 == 0 {
                self.filled[level] = node;
                self.hasher.hash(node, self.zeros[level])
            } else {
                self.hasher.hash(self.filled[level], node)
            };

            position /= 2;
        }

        self.root = node;
        self.next_index += 1;

        Ok((index, node))
    }

    /// Whether `count` more leaves fit
    #[must_use]
    pub fn has_room_for(&self, count: u64) -> bool {
        self.next_index
            .checked_add(count)
            .is_some_and(|end| end <= Self::CAPACITY)
    }

    /// The current root
    #[must_use]
    pub fn root(&self) -> Element {
        self.root
    }

    /// The index the next leaf will get, equal to the number of leaves inserted
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }
}
