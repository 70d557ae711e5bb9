use std::collections::VecDeque;

use accumulator::{MerkleProof, PoseidonHasher, TREE_DEPTH};
use async_trait::async_trait;
use client::{Circuit, CircuitInputs, Error, PoseidonCircuit, Proof, Prover, Result};
use parking_lot::Mutex;
use primitives::Amount;
use zk_primitives::{hash_merge, Element, PublicInputs};

/// The proof bytes [`LocalProver`] emits for `public_inputs`
#[must_use]
pub fn proof_bytes(public_inputs: &PublicInputs) -> Vec<u8> {
    hash_merge(public_inputs.to_array()).to_be_bytes().to_vec()
}

/// Checks the relations of the spend circuit in the clear, then "proves" them
#[derive(Debug, Clone, Default)]
pub struct LocalProver<C = PoseidonCircuit> {
    circuit: C,
}

impl<C: Circuit> LocalProver<C> {
    pub fn new(circuit: C) -> Self {
        Self { circuit }
    }

    fn check(&self, inputs: &CircuitInputs) -> std::result::Result<(), String> {
        let public = &inputs.public;
        let nullifiers = public.nullifiers();

        for (slot, (input, nullifier)) in inputs.inputs.iter().zip(nullifiers).enumerate() {
            if self.circuit.nullifier(input.secret, input.leaf_index) != nullifier {
                return Err(format!("input {slot}: nullifier mismatch"));
            }

            if input.is_dummy {
                if !input.value.is_zero() {
                    return Err(format!("input {slot}: dummy carries value"));
                }
                continue;
            }

            let commitment = self
                .circuit
                .commitment(input.value, input.secret, input.owner);
            let path = MerkleProof::<TREE_DEPTH> {
                leaf_index: input.leaf_index,
                root: public.merkle_root,
                siblings: input.path,
                directions: input.dirs.map(|bit| bit == 1),
            };
            if !path.proves(commitment, &PoseidonHasher) {
                return Err(format!("input {slot}: not in the tree"));
            }
        }

        let commitments = public.out_commitments();
        let encrypted = [public.encrypted_value_1, public.encrypted_value_2];
        for (slot, output) in inputs.outputs.iter().enumerate() {
            if self
                .circuit
                .commitment(output.value, output.secret, output.owner)
                != commitments[slot]
            {
                return Err(format!("output {slot}: commitment mismatch"));
            }
            if self.circuit.encrypt_value(output.value, output.viewing_key) != encrypted[slot] {
                return Err(format!("output {slot}: encrypted value mismatch"));
            }
        }

        let total_in: Amount = inputs
            .inputs
            .iter()
            .map(|input| Amount::from_element(input.value))
            .sum();
        let total_out: Amount = inputs
            .outputs
            .iter()
            .map(|output| Amount::from_element(output.value))
            .sum();
        if total_in < total_out.saturating_add(Amount::from_element(public.fee)) {
            return Err("outputs exceed inputs".to_string());
        }

        Ok(())
    }
}

#[async_trait]
impl<C: Circuit> Prover for LocalProver<C> {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof> {
        self.check(inputs).map_err(Error::Prover)?;

        Ok(Proof {
            bytes: proof_bytes(&inputs.public),
            public_inputs: inputs.public,
        })
    }
}

/// What [`ScriptedProver`] does on one call
#[derive(Debug, Clone)]
pub enum Step {
    /// Delegate to [`LocalProver`]
    Prove,
    /// Fail like a crashed prove server
    Fail(String),
    /// Never finish
    Hang,
    /// Return a proof for different public inputs
    Tamper,
}

/// A [`LocalProver`] that follows a script, then proves normally once it runs out
#[derive(Debug, Default)]
pub struct ScriptedProver<C = PoseidonCircuit> {
    inner: LocalProver<C>,
    steps: Mutex<VecDeque<Step>>,
    seen: Mutex<Vec<CircuitInputs>>,
}

impl<C: Circuit> ScriptedProver<C> {
    pub fn new(circuit: C, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            inner: LocalProver::new(circuit),
            steps: Mutex::new(steps.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every input this prover was called with, in order
    pub fn seen(&self) -> Vec<CircuitInputs> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl<C: Circuit> Prover for ScriptedProver<C> {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<Proof> {
        self.seen.lock().push(inputs.clone());
        let step = self.steps.lock().pop_front().unwrap_or(Step::Prove);

        match step {
            Step::Prove => self.inner.prove(inputs).await,
            Step::Fail(message) => Err(Error::Prover(message)),
            Step::Hang => std::future::pending().await,
            Step::Tamper => {
                let mut proof = self.inner.prove(inputs).await?;
                proof.public_inputs.fee = Element::new(1);
                Ok(proof)
            }
        }
    }
}
