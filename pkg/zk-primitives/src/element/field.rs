use ethnum::{uint, U256};
use ff::PrimeField;

use crate::{hash_merge, Base, Element};

impl Element {
    /// The modulus of the BN254 scalar field the circuit works over
    pub const MODULUS: Element = Element(uint!(
        "0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001"
    ));

    /// Hash this element (on the left) together with `other`
    ///
    /// ```rust
    /// # use zk_primitives::*;
    /// let a = Element::new(1);
    /// let b = Element::new(2);
    ///
    /// assert_eq!(a.hashed_with(b), hash_merge([a, b]));
    /// ```
    #[inline]
    #[must_use = "this function doesn't modify self"]
    pub fn hashed_with(self, other: Element) -> Self {
        hash_merge([self, other])
    }

    /// Convert this [`Element`] to its equivalent [`Base`] representation
    ///
    /// Values at or above [`Element::MODULUS`] are reduced by the field
    #[inline]
    #[must_use]
    pub fn to_base(self) -> Base {
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(self.0.to_le_bytes().chunks_exact(8)) {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(bytes);
        }

        Base::from_raw(limbs)
    }

    /// Create an [`Element`] from a [`Base`]
    #[inline]
    #[must_use]
    pub fn from_base(base: Base) -> Element {
        Self(U256::from_le_bytes(base.to_repr()))
    }

    /// Reduce this element modulo [`Element::MODULUS`]
    ///
    /// Canonical elements are unchanged by a round trip through [`Base`]
    #[inline]
    pub fn canonicalize(&mut self) {
        self.0 %= Self::MODULUS.0;
    }

    /// Whether this [`Element`] is already below [`Element::MODULUS`]
    #[inline]
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.0 < Self::MODULUS.0
    }
}

impl From<Base> for Element {
    fn from(value: Base) -> Self {
        Element::from_base(value)
    }
}

impl From<Element> for Base {
    fn from(value: Element) -> Self {
        value.to_base()
    }
}
