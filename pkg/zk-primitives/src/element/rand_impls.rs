use ethnum::U256;
use rand::{CryptoRng, Rng, RngCore};

use crate::Element;

impl Element {
    /// A uniformly random canonical element
    ///
    /// Rejection-samples 254-bit values until one falls below [`Element::MODULUS`]
    #[must_use]
    pub fn secure_random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x3f;

            let candidate = Self::from_be_bytes(bytes);
            if candidate.is_canonical() {
                return candidate;
            }
        }
    }

    /// A random 128-bit value, used for note secrets and viewing keys
    ///
    /// Always canonical, so it can be handed to the circuit as-is
    #[must_use]
    pub fn random_secret<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(U256::from(rng.gen::<u128>()))
    }
}
