#[cfg(feature = "serde")]
pub(super) mod hex {
    use ethnum::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(in crate::element) fn serialize<S>(u: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", ::hex::encode(u.to_be_bytes())))
    }

    /// Accepts any hex string of at most 32 bytes, with or without the `0x` prefix
    pub(in crate::element) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let digits = s.trim_start_matches("0x");
        let digits = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };

        let vec = ::hex::decode(digits).map_err(serde::de::Error::custom)?;
        let element =
            crate::Element::from_be_slice(&vec).map_err(serde::de::Error::custom)?;

        Ok(element.0)
    }
}

#[cfg(feature = "borsh")]
mod borsh_impls {
    use borsh::{BorshDeserialize, BorshSerialize};

    use crate::Element;

    impl BorshSerialize for Element {
        fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
            self.to_be_bytes().serialize(writer)
        }
    }

    impl BorshDeserialize for Element {
        fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
            <[u8; 32]>::deserialize_reader(reader).map(Element::from_be_bytes)
        }
    }
}
