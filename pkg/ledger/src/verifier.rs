use std::sync::Arc;

use zk_primitives::PublicInputs;

/// Checks a spend proof against its public inputs
///
/// The ledger never re-derives value conservation or note ownership; that is the circuit's job,
/// and a verifier that accepts a proof vouches for all of it.
pub trait Verifier: Send + Sync {
    fn verify(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool;
}

impl<V: Verifier + ?Sized> Verifier for Arc<V> {
    fn verify(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        (**self).verify(proof, public_inputs)
    }
}

impl<V: Verifier + ?Sized> Verifier for Box<V> {
    fn verify(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        (**self).verify(proof, public_inputs)
    }
}
