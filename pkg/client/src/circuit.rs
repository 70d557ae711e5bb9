use std::sync::Arc;

use zk_primitives::{hash_merge, Element};

/// The hash functions of the spend circuit, evaluated outside of a proof
///
/// The client needs the same commitments, nullifiers and encrypted values the circuit will
/// constrain, so it can fill in the public inputs and store notes before proving.
pub trait Circuit: Send + Sync {
    /// The commitment inserted into the tree for a note
    fn commitment(&self, value: Element, secret: Element, owner: Element) -> Element;

    /// The nullifier revealed when the note at `leaf_index` is spent
    fn nullifier(&self, secret: Element, leaf_index: u64) -> Element;

    /// `value` encrypted to `viewing_key`
    fn encrypt_value(&self, value: Element, viewing_key: Element) -> Element;
}

impl<C: Circuit + ?Sized> Circuit for Arc<C> {
    fn commitment(&self, value: Element, secret: Element, owner: Element) -> Element {
        (**self).commitment(value, secret, owner)
    }

    fn nullifier(&self, secret: Element, leaf_index: u64) -> Element {
        (**self).nullifier(secret, leaf_index)
    }

    fn encrypt_value(&self, value: Element, viewing_key: Element) -> Element {
        (**self).encrypt_value(value, viewing_key)
    }
}

/// A [`Circuit`] over the workspace's poseidon hash
///
/// Values are encrypted by adding a pad derived from the viewing key, so they can be recovered
/// with [`PoseidonCircuit::decrypt_value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseidonCircuit;

impl PoseidonCircuit {
    #[must_use]
    pub fn decrypt_value(&self, encrypted: Element, viewing_key: Element) -> Element {
        Element::from_base(encrypted.to_base() - pad(viewing_key).to_base())
    }
}

fn pad(viewing_key: Element) -> Element {
    hash_merge([viewing_key])
}

impl Circuit for PoseidonCircuit {
    fn commitment(&self, value: Element, secret: Element, owner: Element) -> Element {
        hash_merge([value, secret, owner])
    }

    fn nullifier(&self, secret: Element, leaf_index: u64) -> Element {
        hash_merge([secret, Element::new(leaf_index)])
    }

    fn encrypt_value(&self, value: Element, viewing_key: Element) -> Element {
        Element::from_base(value.to_base() + pad(viewing_key).to_base())
    }
}
