use ledger::Verifier;
use zk_primitives::PublicInputs;

use crate::proof_bytes;

/// Accepts every proof
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Verifier for AcceptAll {
    fn verify(&self, _: &[u8], _: &PublicInputs) -> bool {
        true
    }
}

/// Rejects every proof
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

impl Verifier for RejectAll {
    fn verify(&self, _: &[u8], _: &PublicInputs) -> bool {
        false
    }
}

/// Accepts exactly the proofs [`LocalProver`](crate::LocalProver) produces for the given inputs
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalVerifier;

impl Verifier for LocalVerifier {
    fn verify(&self, proof: &[u8], public_inputs: &PublicInputs) -> bool {
        proof == proof_bytes(public_inputs)
    }
}
