use zk_primitives::Element;

use crate::MerkleHasher;

/// A Merkle inclusion proof for one leaf
///
/// `siblings` and `directions` are ordered from the leaf upwards. `directions[h]` is `true` when
/// the path node at height `h` is a right child, i.e. the sibling is on its left. A missing
/// sibling is the empty subtree of that height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MerkleProof<const DEPTH: usize> {
    /// The index of the proven leaf
    pub leaf_index: u64,
    /// The root this proof was generated against
    pub root: Element,
    /// Sibling hashes, deepest first
    pub siblings: [Element; DEPTH],
    /// Whether the path node at each height is a right child
    pub directions: [bool; DEPTH],
}

impl<const DEPTH: usize> MerkleProof<DEPTH> {
    /// Fold `leaf` up through the siblings
    #[must_use]
    pub fn compute_root<H: MerkleHasher>(&self, leaf: Element, hasher: &H) -> Element {
        self.siblings
            .iter()
            .zip(self.directions)
            .fold(leaf, |node, (sibling, is_right)| match is_right {
                false => hasher.hash(node, *sibling),
                true => hasher.hash(*sibling, node),
            })
    }

    /// Whether `leaf` hashes up to [`MerkleProof::root`]
    #[must_use]
    pub fn proves<H: MerkleHasher>(&self, leaf: Element, hasher: &H) -> bool {
        self.compute_root(leaf, hasher) == self.root
    }

    /// The directions as the `0`/`1` bits the circuit expects
    #[must_use]
    pub fn direction_bits(&self) -> [u8; DEPTH] {
        self.directions.map(u8::from)
    }

    /// The path and direction bits of a dummy input: all zero
    #[must_use]
    pub fn dummy() -> Self {
        Self {
            leaf_index: 0,
            root: Element::ZERO,
            siblings: [Element::ZERO; DEPTH],
            directions: [false; DEPTH],
        }
    }
}

#[cfg(test)]
mod tests {
    use zk_primitives::hash_merge;

    use super::*;
    use crate::PoseidonHasher;

    #[test]
    fn folds_with_direction() {
        // leaf 2 of [0, 1, 2, 3]
        let a = hash_merge([Element::new(0), Element::new(1)]);
        let b = hash_merge([Element::new(2), Element::new(3)]);

        let proof = MerkleProof::<2> {
            leaf_index: 2,
            root: hash_merge([a, b]),
            siblings: [Element::new(3), a],
            directions: [false, true],
        };

        assert!(proof.proves(Element::new(2), &PoseidonHasher));
        assert!(!proof.proves(Element::ZERO, &PoseidonHasher));
        assert_eq!(proof.direction_bits(), [0, 1]);
    }

    #[test]
    fn dummy_paths_are_zero() {
        let proof = MerkleProof::<20>::dummy();

        assert!(proof.siblings.iter().all(|s| s.is_zero()));
        assert_eq!(proof.direction_bits(), [0; 20]);
    }
}
