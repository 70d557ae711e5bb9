use crate::{Element, Error};

/// The nine public inputs of a spend, in circuit order
///
/// The same layout is produced by the prover and checked by the ledger's verifier, so the order of
/// [`PublicInputs::to_array`] is part of the wire format:
///
/// `[merkle_root, nullifier_1, nullifier_2, out_commitment_1, out_commitment_2, fee, relayer,
/// encrypted_value_1, encrypted_value_2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "borsh", derive(borsh::BorshSerialize, borsh::BorshDeserialize))]
pub struct PublicInputs {
    /// The tree root the input notes were proven against
    pub merkle_root: Element,
    /// Nullifier of the first input note
    pub nullifier_1: Element,
    /// Nullifier of the second (possibly dummy) input note
    pub nullifier_2: Element,
    /// Commitment of the first output note
    pub out_commitment_1: Element,
    /// Commitment of the second output note
    pub out_commitment_2: Element,
    /// Fee paid to the relayer out of the pool's custody
    pub fee: Element,
    /// The relayer's address, left-padded to 32 bytes
    pub relayer: Element,
    /// First output value, encrypted to its viewing key
    pub encrypted_value_1: Element,
    /// Second output value, encrypted to its viewing key
    pub encrypted_value_2: Element,
}

impl PublicInputs {
    /// The number of public inputs
    pub const LEN: usize = 9;

    /// The inputs in circuit order
    #[must_use]
    pub fn to_array(&self) -> [Element; Self::LEN] {
        [
            self.merkle_root,
            self.nullifier_1,
            self.nullifier_2,
            self.out_commitment_1,
            self.out_commitment_2,
            self.fee,
            self.relayer,
            self.encrypted_value_1,
            self.encrypted_value_2,
        ]
    }

    /// Build from inputs in circuit order
    #[must_use]
    pub fn from_array(array: [Element; Self::LEN]) -> Self {
        let [merkle_root, nullifier_1, nullifier_2, out_commitment_1, out_commitment_2, fee, relayer, encrypted_value_1, encrypted_value_2] =
            array;

        Self {
            merkle_root,
            nullifier_1,
            nullifier_2,
            out_commitment_1,
            out_commitment_2,
            fee,
            relayer,
            encrypted_value_1,
            encrypted_value_2,
        }
    }

    /// Both nullifiers, in order
    #[must_use]
    pub fn nullifiers(&self) -> [Element; 2] {
        [self.nullifier_1, self.nullifier_2]
    }

    /// Both output commitments, in order
    #[must_use]
    pub fn out_commitments(&self) -> [Element; 2] {
        [self.out_commitment_1, self.out_commitment_2]
    }

    /// The 32-byte big-endian words handed to an on-chain style verifier
    #[must_use]
    pub fn to_bytes32(&self) -> [[u8; 32]; Self::LEN] {
        self.to_array().map(Element::to_be_bytes)
    }

    /// Parse the `0x`-prefixed words returned by a prover
    ///
    /// ```rust
    /// # use zk_primitives::*;
    /// let words: Vec<String> = (1..=9).map(|i| format!("0x{i:064x}")).collect();
    /// let inputs = PublicInputs::from_hex_words(&words).unwrap();
    ///
    /// assert_eq!(inputs.merkle_root, Element::new(1));
    /// assert_eq!(inputs.encrypted_value_2, Element::new(9));
    ///
    /// assert!(PublicInputs::from_hex_words(&words[..8]).is_err());
    /// ```
    pub fn from_hex_words<S: AsRef<str>>(words: &[S]) -> Result<Self, Error> {
        let elements = words
            .iter()
            .map(|word| word.as_ref().parse())
            .collect::<Result<Vec<Element>, _>>()?;

        Self::try_from(elements.as_slice())
    }
}

impl TryFrom<&[Element]> for PublicInputs {
    type Error = Error;

    fn try_from(value: &[Element]) -> Result<Self, Self::Error> {
        let array = <[Element; Self::LEN]>::try_from(value).map_err(|_| Error::WrongLength {
            expected: Self::LEN,
            got: value.len(),
        })?;

        Ok(Self::from_array(array))
    }
}

impl From<PublicInputs> for [Element; PublicInputs::LEN] {
    fn from(value: PublicInputs) -> Self {
        value.to_array()
    }
}
