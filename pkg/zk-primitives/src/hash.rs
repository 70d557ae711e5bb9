use poseidon_circuit::poseidon::primitives::{ConstantLength, Hash, P128Pow5T3};

use crate::{Base, Element};

/// Poseidon hash of a fixed number of elements
///
/// With `N = 2` this is the node function of the commitment tree:
/// `parent = hash_merge([left, right])`.
///
/// ```rust
/// # use zk_primitives::*;
/// let a = hash_merge([Element::new(1), Element::new(2)]);
/// let b = hash_merge([Element::new(1), Element::new(3)]);
///
/// assert_ne!(a, b);
/// ```
/// The order of the inputs matters:
/// ```rust
/// # use zk_primitives::*;
/// let a = Element::new(1);
/// let b = Element::new(2);
///
/// assert_ne!(hash_merge([a, b]), hash_merge([b, a]));
/// ```
#[inline]
#[must_use]
pub fn hash_merge<const N: usize>(elements: [Element; N]) -> Element {
    type H<const N: usize> = Hash<Base, P128Pow5T3<Base>, ConstantLength<N>, 3, 2>;

    let hash = H::<N>::init().hash(elements.map(Element::to_base));
    Element::from_base(hash)
}

#[cfg(test)]
mod tests {
    use rand_chacha::{rand_core::SeedableRng, ChaChaRng};

    use super::*;

    #[test]
    fn outputs_are_canonical() {
        let mut rng = ChaChaRng::from_seed([0; 32]);

        for _ in 0..16 {
            let left = Element::secure_random(&mut rng);
            let right = Element::secure_random(&mut rng);

            assert!(hash_merge([left, right]).is_canonical());
        }
    }

    #[test]
    fn arity_is_part_of_the_domain() {
        let pair = hash_merge([Element::ONE, Element::ZERO]);
        let triple = hash_merge([Element::ONE, Element::ZERO, Element::ZERO]);

        assert_ne!(pair, triple);
    }

    #[test]
    fn non_canonical_inputs_hash_like_their_reduction() {
        let mut reduced = Element::MAX;
        reduced.canonicalize();

        assert_eq!(
            hash_merge([Element::MAX, Element::ONE]),
            hash_merge([reduced, Element::ONE])
        );
    }
}
