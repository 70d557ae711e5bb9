use std::{fmt, str::FromStr};

use borsh::{BorshDeserialize, BorshSerialize};
use ethnum::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zk_primitives::Element;

/// A token amount
///
/// Amounts are plain 256-bit integers. They become field elements when they are written into
/// notes or the `fee` public input, and come back out of the `fee` input on the ledger side.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount overflow")]
    Overflow,

    #[error("amount underflow: {lhs} - {rhs}")]
    Underflow { lhs: Amount, rhs: Amount },

    #[error("invalid amount: {0:?}")]
    Parse(String),
}

impl Amount {
    pub const ZERO: Self = Self(U256::ZERO);

    #[must_use]
    pub const fn new(value: u128) -> Self {
        Self(U256::new(value))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    #[must_use]
    pub fn to_u256(self) -> U256 {
        self.0
    }

    #[must_use]
    pub fn to_element(self) -> Element {
        Element::from(self.0)
    }

    #[must_use]
    pub fn from_element(element: Element) -> Self {
        Self(element.to_u256())
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    #[must_use]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(AmountError::Underflow { lhs: self, rhs })
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(U256::new(value))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl core::iter::Sum for Amount {
    /// Saturates at [`U256::MAX`]; use [`Amount::checked_add`] where overflow matters
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(U256::ZERO, |acc, amount| acc.saturating_add(amount.0)))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str_radix(s.trim(), 10)
            .map(Self)
            .map_err(|_| AmountError::Parse(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// decimal strings, so large values survive JSON
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

struct AmountVisitor;

impl<'de> serde::de::Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or an unsigned integer")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u128<E: serde::de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Amount, E> {
        u64::try_from(v)
            .map(Amount::from)
            .map_err(|_| E::custom(AmountError::Parse(v.to_string())))
    }
}

// accepts integers too, for config values that arrive unquoted
impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

impl BorshSerialize for Amount {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.to_be_bytes().serialize(writer)
    }
}

impl BorshDeserialize for Amount {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        <[u8; 32]>::deserialize_reader(reader).map(|bytes| Self(U256::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_checked() {
        let a = Amount::new(100);
        let b = Amount::new(30);

        assert_eq!(a.checked_sub(b).unwrap(), Amount::new(70));
        assert_eq!(
            b.checked_sub(a),
            Err(AmountError::Underflow { lhs: b, rhs: a })
        );
        assert_eq!(
            Amount::from(U256::MAX).checked_add(Amount::new(1)),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn json_uses_decimal_strings() {
        let amount = Amount::new(1_000_000_000_000_000_000);

        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, r#""1000000000000000000""#);
        assert_eq!(serde_json::from_str::<Amount>(&json).unwrap(), amount);
        assert_eq!(serde_json::from_str::<Amount>("42").unwrap(), Amount::new(42));
        assert!(serde_json::from_str::<Amount>("-1").is_err());
    }

    #[test]
    fn fee_element_round_trips() {
        let fee = Amount::new(7);
        assert_eq!(Amount::from_element(fee.to_element()), fee);
    }
}
