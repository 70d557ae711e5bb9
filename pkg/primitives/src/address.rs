use std::{fmt, str::FromStr};

use borsh::{BorshDeserialize, BorshSerialize};
use ethereum_types::H160;
use serde::{Deserialize, Serialize};
use zk_primitives::Element;

/// A 20-byte account address
///
/// Addresses enter the circuit in two places: as the `owner` field of a note, and as the `relayer`
/// public input. Both use the same embedding, the address read as a big-endian integer, which is
/// the same as left-padding it to 32 bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub H160);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("element {0} does not fit in 20 bytes")]
    NotAnAddress(Element),

    #[error("invalid address: {0:?}")]
    Parse(String),
}

impl Address {
    pub const ZERO: Self = Self(H160::zero());

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(H160(bytes))
    }

    #[must_use]
    pub fn from_low_u64_be(value: u64) -> Self {
        Self(H160::from_low_u64_be(value))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The address as a field element, left-padded to 32 bytes
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut bytes = [0u8; 32];
        bytes[12..32].copy_from_slice(self.0.as_bytes());
        Element::from_be_bytes(bytes)
    }

    /// Recover an address from its padded field element
    ///
    /// Fails if any of the upper 12 bytes are set
    pub fn from_element(element: Element) -> Result<Self, AddressError> {
        let bytes = element.to_be_bytes();
        if bytes[..12].iter().any(|b| *b != 0) {
            return Err(AddressError::NotAnAddress(element));
        }

        Ok(Self(H160::from_slice(&bytes[12..32])))
    }
}

impl From<H160> for Address {
    fn from(value: H160) -> Self {
        Self(value)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches("0x");
        let bytes = hex::decode(digits).map_err(|_| AddressError::Parse(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressError::Parse(s.to_string()));
        }

        Ok(Self(H160::from_slice(&bytes)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl BorshSerialize for Address {
    fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.to_fixed_bytes().serialize(writer)
    }
}

impl BorshDeserialize for Address {
    fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
        <[u8; 20]>::deserialize_reader(reader).map(|bytes| Self(H160::from(bytes)))
    }
}
