use ethnum::U256;

mod convert;
mod field;
mod fmt;

#[cfg(feature = "rand")]
mod rand_impls;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serde;

/// An opaque 256-bit value used for commitments, nullifiers, roots and every other public input
///
/// The pool never looks inside an [`Element`]: they are produced by the circuit's hash functions
/// and only ever compared for equality. Internally this wraps a [`U256`], so any value in
/// `0..=(2^256 - 1)` can be represented, but only values below [`Element::MODULUS`] survive a
/// round trip through the circuit's field (see [`Element::canonicalize`]).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Element(#[cfg_attr(feature = "serde", serde(with = "serde::hex"))] pub(crate) U256);

impl Element {
    /// The zero element, also the empty leaf of the commitment tree
    pub const ZERO: Self = Self(U256::ZERO);

    /// The one element
    pub const ONE: Self = Self(U256::ONE);

    /// The largest representable element (not canonical)
    pub const MAX: Self = Self(U256::MAX);

    /// Create a new [`Element`] from a u64
    ///
    /// This is largely provided to help type inference in simple cases
    #[inline]
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn new(i: u64) -> Self {
        Self(U256::new(i as u128))
    }

    /// Attempt to interpret this [`Element`] as a bit
    ///
    /// If this value is not 0 or 1, `None` is returned
    #[inline]
    #[must_use]
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::ZERO => Some(false),
            Self::ONE => Some(true),
            _else => None,
        }
    }

    /// The underlying integer
    #[inline]
    #[must_use]
    pub fn to_u256(self) -> U256 {
        self.0
    }

    /// The 32-byte, `0x`-prefixed big-endian hex encoding used for public inputs
    ///
    /// ```rust
    /// # use zk_primitives::*;
    /// assert_eq!(Element::new(255).to_hex(), format!("0x{}ff", "0".repeat(62)));
    /// ```
    #[inline]
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    /// The decimal encoding, as accepted by the prover's input format
    #[inline]
    #[must_use]
    pub fn to_decimal(self) -> String {
        self.0.to_string()
    }

    /// If this element is zero, returns true
    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }
}

#[cfg(any(test, feature = "proptest"))]
mod proptest {
    use super::Element;
    use ::proptest::{arbitrary::StrategyFor, prelude::*, strategy::Map};
    use ethnum::U256;

    impl Arbitrary for Element {
        type Strategy = Map<StrategyFor<[u8; 32]>, fn([u8; 32]) -> Self>;
        type Parameters = ();

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            any::<[u8; 32]>().prop_map(|array| Self(U256::from_be_bytes(array)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Element;

    #[test]
    fn bits() {
        assert_eq!(Element::ZERO.as_bool(), Some(false));
        assert_eq!(Element::ONE.as_bool(), Some(true));
        assert_eq!(Element::new(2).as_bool(), None);
    }

    #[test]
    fn encodings() {
        let element = Element::new(1_000_000);

        assert_eq!(element.to_decimal(), "1000000");
        assert_eq!(element.to_hex().len(), 66);
        assert!(element.to_hex().ends_with("0f4240"));
        assert_eq!(element.to_string(), "0xf4240");
    }
}
