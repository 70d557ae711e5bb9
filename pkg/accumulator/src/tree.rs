use std::sync::{Arc, OnceLock};

use zk_primitives::Element;

use crate::{Error, MerkleHasher, MerkleProof, PoseidonHasher, Result};

/// An append-only Merkle tree that keeps every leaf
///
/// Leaves occupy indices `0..leaf_count()` in insertion order. Everything to the right of the last
/// leaf is empty, and an empty subtree of height `h` hashes to `zero[h]`.
///
/// The root is a pure function of the leaves. It is computed level by level: adjacent nodes are
/// paired left to right, and a trailing node with no partner is paired with the empty subtree of
/// its height.
///
/// ```rust
/// # use accumulator::*;
/// # use zk_primitives::Element;
/// let mut tree = MerkleAccumulator::<TREE_DEPTH>::new();
/// let empty_root = tree.root();
///
/// let index = tree.insert_leaf(Element::new(42)).unwrap();
/// assert_eq!(index, 0);
/// assert_ne!(tree.root(), empty_root);
///
/// let proof = tree.merkle_proof(0).unwrap();
/// assert!(proof.proves(Element::new(42), &PoseidonHasher));
/// ```
#[derive(Debug, Clone)]
pub struct MerkleAccumulator<const DEPTH: usize, H = PoseidonHasher> {
    leaves: Vec<Element>,
    zeros: Arc<[Element]>,
    hasher: H,
    root: OnceLock<Element>,
}

impl<const DEPTH: usize, H: MerkleHasher + Default> MerkleAccumulator<DEPTH, H> {
    /// An empty tree
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<const DEPTH: usize, H: MerkleHasher + Default> Default for MerkleAccumulator<DEPTH, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize, H: MerkleHasher> MerkleAccumulator<DEPTH, H> {
    /// The maximum number of leaves, `2^DEPTH`
    pub const CAPACITY: u64 = 1 << DEPTH;

    /// An empty tree using `hasher` for its nodes
    #[must_use]
    pub fn with_hasher(hasher: H) -> Self {
        let zeros = hasher.zero_hashes(DEPTH);

        Self {
            leaves: Vec::new(),
            zeros,
            hasher,
            root: OnceLock::new(),
        }
    }

    /// Build a tree from leaves in index order
    pub fn from_leaves(hasher: H, leaves: impl IntoIterator<Item = Element>) -> Result<Self> {
        let mut tree = Self::with_hasher(hasher);
        for leaf in leaves {
            tree.insert_leaf(leaf)?;
        }

        Ok(tree)
    }

    /// Append a leaf, returning its index
    pub fn insert_leaf(&mut self, leaf: Element) -> Result<u64> {
        let index = self.leaf_count();
        if index >= Self::CAPACITY {
            return Err(Error::TreeFull {
                capacity: Self::CAPACITY,
            });
        }

        self.leaves.push(leaf);
        self.root = OnceLock::new();

        Ok(index)
    }

    /// Remove every leaf
    pub fn clear(&mut self) {
        self.leaves.clear();
        self.root = OnceLock::new();
    }

    /// The number of leaves inserted so far
    #[must_use]
    pub fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Whether no leaves have been inserted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// The leaves, in index order
    #[must_use]
    pub fn leaves(&self) -> &[Element] {
        &self.leaves
    }

    /// The leaf at `index`, if it exists
    #[must_use]
    pub fn leaf(&self, index: u64) -> Option<Element> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.leaves.get(index))
            .copied()
    }

    /// The hash of an empty subtree of height `level`
    #[must_use]
    pub fn zero(&self, level: usize) -> Element {
        self.zeros[level]
    }

    /// The hasher this tree uses
    #[must_use]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// The current root
    ///
    /// Cached until the next insertion, so repeated calls are free
    #[must_use]
    pub fn root(&self) -> Element {
        *self.root.get_or_init(|| self.compute_root())
    }

    fn compute_root(&self) -> Element {
        if self.leaves.is_empty() {
            return self.zeros[DEPTH];
        }

        let mut level = self.leaves.clone();
        for height in 0..DEPTH {
            level = self.parent_level(&level, height);
        }

        level[0]
    }

    /// An inclusion proof for the leaf at `index`, against the current root
    pub fn merkle_proof(&self, index: u64) -> Result<MerkleProof<DEPTH>> {
        let leaf_count = self.leaf_count();
        if index >= leaf_count {
            return Err(Error::IndexOutOfRange { index, leaf_count });
        }

        let mut siblings = [Element::ZERO; DEPTH];
        let mut directions = [false; DEPTH];

        let mut level = self.leaves.clone();
        // `index < leaf_count`, which came from a `usize`
        let mut position = index as usize;

        for height in 0..DEPTH {
            let is_right = position % 2 == 1;
            let sibling = if is_right { position - 1 } else { position + 1 };

            directions[height] = is_right;
            siblings[height] = level.get(sibling).copied().unwrap_or(self.zeros[height]);

            level = self.parent_level(&level, height);
            position /= 2;
        }

        Ok(MerkleProof {
            leaf_index: index,
            root: level[0],
            siblings,
            directions,
        })
    }

    /// Hash the nodes at `height` into the level above
    ///
    /// An empty level stays empty one level up, so it collapses to `zero[height + 1]`
    fn parent_level(&self, level: &[Element], height: usize) -> Vec<Element> {
        if level.is_empty() {
            return vec![self.zeros[height + 1]];
        }

        level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).copied().unwrap_or(self.zeros[height]);
                self.hasher.hash(pair[0], right)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_strategy::proptest;
    use zk_primitives::hash_merge;

    use super::*;
    use crate::TREE_DEPTH;

    type Tree = MerkleAccumulator<TREE_DEPTH>;

    #[test]
    fn empty_tree_root_is_the_top_zero() {
        let tree = Tree::new();
        let zeros = PoseidonHasher.zero_hashes(TREE_DEPTH);

        assert_eq!(tree.root(), zeros[TREE_DEPTH]);
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn single_leaf_pairs_with_zero_at_every_level() {
        let leaf = Element::new(0xc0ffee);
        let mut tree = Tree::new();
        tree.insert_leaf(leaf).unwrap();

        let proof = tree.merkle_proof(0).unwrap();
        let zeros = PoseidonHasher.zero_hashes(TREE_DEPTH);

        assert_eq!(&proof.siblings[..], &zeros[..TREE_DEPTH]);
        assert!(proof.directions.iter().all(|right| !right));

        let expected = zeros[..TREE_DEPTH]
            .iter()
            .fold(leaf, |node, zero| hash_merge([node, *zero]));
        assert_eq!(tree.root(), expected);
        assert_eq!(proof.root, expected);
    }

    #[test]
    fn second_leaf_sits_on_the_right() {
        let mut tree = Tree::new();
        tree.insert_leaf(Element::new(1)).unwrap();
        tree.insert_leaf(Element::new(2)).unwrap();

        let proof = tree.merkle_proof(1).unwrap();

        assert!(proof.directions[0]);
        assert_eq!(proof.siblings[0], Element::new(1));
        assert!(proof.directions[1..].iter().all(|right| !right));
    }

    #[test]
    fn proof_past_the_end_is_out_of_range() {
        let mut tree = Tree::new();
        tree.insert_leaf(Element::ONE).unwrap();

        assert_eq!(
            tree.merkle_proof(1).unwrap_err(),
            Error::IndexOutOfRange {
                index: 1,
                leaf_count: 1
            }
        );
    }

    #[test]
    fn small_tree_fills_up() {
        let mut tree = MerkleAccumulator::<2>::new();
        for i in 0..4 {
            assert_eq!(tree.insert_leaf(Element::new(i)).unwrap(), i);
        }

        assert_eq!(
            tree.insert_leaf(Element::new(4)).unwrap_err(),
            Error::TreeFull { capacity: 4 }
        );

        let a = hash_merge([Element::new(0), Element::new(1)]);
        let b = hash_merge([Element::new(2), Element::new(3)]);
        assert_eq!(tree.root(), hash_merge([a, b]));
    }

    #[proptest(cases = 32)]
    fn every_proof_recomputes_the_root(
        #[strategy(proptest::collection::vec(proptest::arbitrary::any::<Element>(), 1..12))]
        leaves: Vec<Element>,
    ) {
        let tree = Tree::from_leaves(PoseidonHasher, leaves.iter().copied()).unwrap();
        let root = tree.root();

        for (index, leaf) in leaves.iter().enumerate() {
            let proof = tree.merkle_proof(index as u64).unwrap();

            assert_eq!(proof.root, root);
            assert_eq!(proof.compute_root(*leaf, &PoseidonHasher), root);
        }

        // idempotent between insertions
        assert_eq!(tree.root(), root);
    }
}
