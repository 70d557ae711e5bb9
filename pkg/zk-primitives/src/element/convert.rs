use crate::{Element, Error};
use core::num::TryFromIntError;
use ethnum::U256;
use std::str::FromStr;

macro_rules! from_int_impls {
    ($t:ty) => {
        impl From<$t> for Element {
            #[inline]
            fn from(value: $t) -> Self {
                Element(U256::from(value))
            }
        }

        impl TryFrom<Element> for $t {
            type Error = TryFromIntError;

            #[inline]
            fn try_from(value: Element) -> Result<Self, Self::Error> {
                <$t>::try_from(value.0)
            }
        }
    };
}

from_int_impls!(u8);
from_int_impls!(u16);
from_int_impls!(u32);
from_int_impls!(u64);
from_int_impls!(u128);

impl From<bool> for Element {
    #[inline]
    fn from(value: bool) -> Self {
        match value {
            false => Self::ZERO,
            true => Self::ONE,
        }
    }
}

impl From<U256> for Element {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Element> for U256 {
    fn from(value: Element) -> Self {
        value.0
    }
}

/// Parses `0x`-prefixed hex, or decimal otherwise
///
/// Both forms show up at the prover boundary: public inputs come back as bytes32 hex, while
/// circuit inputs are written as decimal strings.
///
/// ```rust
/// # use zk_primitives::*;
/// let a: Element = "0x0b".parse().unwrap();
/// let b: Element = "11".parse().unwrap();
/// assert_eq!(a, b);
/// ```
impl FromStr for Element {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(s, 10),
        };

        parsed
            .map(Self)
            .map_err(|_| Error::InvalidElement(s.to_string()))
    }
}

impl Element {
    /// Convert the [`Element`] to its bytes in big-endian format
    ///
    /// ```rust
    /// # use zk_primitives::*;
    /// let element = Element::ONE;
    /// assert_eq!(element.to_be_bytes(), {
    ///     let mut temp = [0; 32];
    ///     temp[31] = 1;
    ///     temp
    /// });
    /// ```
    #[inline]
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 32] {
        self.0.to_be_bytes()
    }

    /// Convert the [`Element`] to its bytes in little-endian format
    #[inline]
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; 32] {
        self.0.to_le_bytes()
    }

    /// Convert big-endian bytes into an [`Element`]
    #[inline]
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }

    /// Convert little-endian bytes into an [`Element`]
    #[inline]
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Self(U256::from_le_bytes(bytes))
    }

    /// Read a big-endian value of at most 32 bytes, left-padding shorter input with zeroes
    ///
    /// ```rust
    /// # use zk_primitives::*;
    /// assert_eq!(Element::from_be_slice(&[1, 0]).unwrap(), Element::new(256));
    /// assert!(Element::from_be_slice(&[0; 33]).is_err());
    /// ```
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() > 32 {
            return Err(Error::WrongLength {
                expected: 32,
                got: bytes.len(),
            });
        }

        let mut padded = [0; 32];
        padded[32 - bytes.len()..].copy_from_slice(bytes);
        Ok(Self::from_be_bytes(padded))
    }
}
