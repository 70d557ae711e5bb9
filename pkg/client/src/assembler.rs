use std::collections::HashSet;

use accumulator::{MerkleHasher, MerkleProof, TreeReplica, TREE_DEPTH};
use notes::{Note, NoteState, SpendIntent};
use primitives::Amount;
use rand::{CryptoRng, RngCore};
use zk_primitives::{Element, PublicInputs};

use crate::{Circuit, CircuitInputs, Error, InputNote, OutputNote, Result};

/// The leaf index dummy inputs claim
///
/// Past the end of any tree a real pool will reach, so a dummy nullifier never collides with a
/// real one for the same secret.
pub const DUMMY_LEAF_INDEX: u64 = 999_999;

/// The circuit inputs for a spend, and the pending notes its outputs will become
#[derive(Debug, Clone)]
pub struct AssembledSpend {
    pub inputs: CircuitInputs,
    /// Staged output notes in slot order: target first, change second
    pub outputs: [Note; 2],
}

impl AssembledSpend {
    #[must_use]
    pub fn public_inputs(&self) -> &PublicInputs {
        &self.inputs.public
    }
}

/// Pick one or two notes worth at least `target`
///
/// Prefers the smallest single note that covers `target`, otherwise the two largest notes.
pub fn select_notes(candidates: &[Note], target: Amount) -> Result<Vec<Note>> {
    let single = candidates
        .iter()
        .filter(|note| note.value >= target)
        .min_by_key(|note| note.value);
    if let Some(note) = single {
        return Ok(vec![note.clone()]);
    }

    let mut by_value: Vec<&Note> = candidates.iter().collect();
    by_value.sort_by(|a, b| b.value.cmp(&a.value));

    let pair: Vec<Note> = by_value.into_iter().take(2).cloned().collect();
    let available: Amount = pair.iter().map(|note| note.value).sum();
    if pair.len() < 2 || available < target {
        return Err(Error::InsufficientNoteValue {
            available,
            required: target,
        });
    }

    Ok(pair)
}

/// Builds circuit inputs from a holder's notes
///
/// The circuit is fixed at two inputs and two outputs. A single-note spend fills the second input
/// with a dummy, and an output with nothing to carry is a zero-value note.
#[derive(Debug, Clone)]
pub struct ProofInputAssembler<C> {
    circuit: C,
}

impl<C: Circuit> ProofInputAssembler<C> {
    pub fn new(circuit: C) -> Self {
        Self { circuit }
    }

    pub fn circuit(&self) -> &C {
        &self.circuit
    }

    /// Create the pending output notes of a spend
    ///
    /// The target note carries `target_value` to `target_owner`. The change note returns
    /// whatever the inputs hold beyond `spent + fee` to `spender`. Each output gets a fresh
    /// secret and viewing key.
    #[allow(clippy::too_many_arguments)]
    pub fn plan_outputs<R: RngCore + CryptoRng>(
        &self,
        intent: SpendIntent,
        inputs: &[Note],
        spender: Element,
        target_owner: Element,
        target_value: Amount,
        spent: Amount,
        fee: Amount,
        rng: &mut R,
    ) -> Result<[Note; 2]> {
        let available = checked_sum(inputs)?;
        let required = spent
            .checked_add(fee)
            .map_err(|_| Error::InvalidNoteSelection("amount plus fee overflows".to_string()))?;
        let change = available
            .checked_sub(required)
            .map_err(|_| Error::InsufficientNoteValue {
                available,
                required,
            })?;

        Ok([
            self.output(intent, 0, target_value, target_owner, rng),
            self.output(intent, 1, change, spender, rng),
        ])
    }

    fn output<R: RngCore + CryptoRng>(
        &self,
        intent: SpendIntent,
        slot: u8,
        value: Amount,
        owner: Element,
        rng: &mut R,
    ) -> Note {
        let secret = Element::random_secret(rng);
        let commitment = self.circuit.commitment(value.to_element(), secret, owner);

        Note::pending(intent, slot, value, secret, owner, commitment)
            .with_viewing_key(Element::random_secret(rng))
    }

    /// Build the circuit inputs spending `inputs` into `outputs`
    ///
    /// `inputs` must be one or two distinct notes owned by `spender`, each confirmed in `tree`.
    /// The tree must be synced, and its root becomes the spend's `merkle_root`.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble<H: MerkleHasher, R: RngCore + CryptoRng>(
        &self,
        inputs: &[Note],
        outputs: &[Note; 2],
        spender: Element,
        fee: Amount,
        relayer: Element,
        tree: &TreeReplica<TREE_DEPTH, H>,
        rng: &mut R,
    ) -> Result<AssembledSpend> {
        validate_selection(inputs, spender)?;
        if !tree.is_synced() {
            return Err(Error::TreeNotSynced);
        }

        let (input_1, nullifier_1) = self.real_input(&inputs[0], tree)?;
        let (input_2, nullifier_2) = match inputs.get(1) {
            Some(note) => self.real_input(note, tree)?,
            None => self.dummy_input(spender, rng),
        };
        let merkle_root = tree.root();

        let [target, change] = outputs;
        let out_1 = output_slot(target)?;
        let out_2 = output_slot(change)?;

        let public = PublicInputs {
            merkle_root,
            nullifier_1,
            nullifier_2,
            out_commitment_1: target.commitment,
            out_commitment_2: change.commitment,
            fee: fee.to_element(),
            relayer,
            encrypted_value_1: self.circuit.encrypt_value(out_1.value, out_1.viewing_key),
            encrypted_value_2: self.circuit.encrypt_value(out_2.value, out_2.viewing_key),
        };

        Ok(AssembledSpend {
            inputs: CircuitInputs {
                public,
                inputs: [input_1, input_2],
                outputs: [out_1, out_2],
            },
            outputs: outputs.clone(),
        })
    }

    /// The nullifier a note reveals when spent
    pub fn nullifier(&self, note: &Note) -> Option<Element> {
        note.leaf_index
            .map(|leaf_index| self.circuit.nullifier(note.secret, leaf_index))
    }

    fn real_input<H: MerkleHasher>(
        &self,
        note: &Note,
        tree: &TreeReplica<TREE_DEPTH, H>,
    ) -> Result<(InputNote, Element)> {
        let leaf_index = note.leaf_index.ok_or_else(|| {
            Error::InvalidNoteSelection(format!("note {} has no leaf yet", note.id))
        })?;

        match tree.tree().leaf(leaf_index) {
            Some(commitment) if commitment == note.commitment => {}
            Some(_) => return Err(Error::CommitmentMismatch { leaf_index }),
            None => return Err(Error::TreeNotSynced),
        }

        let proof: MerkleProof<TREE_DEPTH> = tree.proof(leaf_index).map_err(|err| match err {
            accumulator::Error::NotSynced => Error::TreeNotSynced,
            err => Error::Tree(err),
        })?;

        let input = InputNote {
            value: note.value.to_element(),
            secret: note.secret,
            owner: note.owner,
            leaf_index,
            path: proof.siblings,
            dirs: proof.direction_bits(),
            is_dummy: false,
        };

        Ok((input, self.circuit.nullifier(note.secret, leaf_index)))
    }

    fn dummy_input<R: RngCore + CryptoRng>(
        &self,
        owner: Element,
        rng: &mut R,
    ) -> (InputNote, Element) {
        let secret = Element::random_secret(rng);
        let proof = MerkleProof::<TREE_DEPTH>::dummy();

        let input = InputNote {
            value: Element::ZERO,
            secret,
            owner,
            leaf_index: DUMMY_LEAF_INDEX,
            path: proof.siblings,
            dirs: proof.direction_bits(),
            is_dummy: true,
        };

        (input, self.circuit.nullifier(secret, DUMMY_LEAF_INDEX))
    }
}

fn checked_sum(notes: &[Note]) -> Result<Amount> {
    notes.iter().try_fold(Amount::ZERO, |sum, note| {
        sum.checked_add(note.value)
            .map_err(|_| Error::InvalidNoteSelection("input values overflow".to_string()))
    })
}

fn validate_selection(inputs: &[Note], spender: Element) -> Result<()> {
    if inputs.is_empty() || inputs.len() > 2 {
        return Err(Error::InvalidNoteSelection(format!(
            "expected 1 or 2 notes, got {}",
            inputs.len()
        )));
    }

    let mut seen = HashSet::new();
    for note in inputs {
        if !seen.insert(note.id) {
            return Err(Error::InvalidNoteSelection(format!(
                "note {} selected twice",
                note.id
            )));
        }

        if note.owner != spender {
            return Err(Error::InvalidNoteSelection(format!(
                "note {} belongs to another owner",
                note.id
            )));
        }

        if !matches!(note.state, NoteState::Unspent | NoteState::Reserved { .. }) {
            return Err(Error::InvalidNoteSelection(format!(
                "note {} is not spendable ({:?})",
                note.id, note.state
            )));
        }
    }

    Ok(())
}

fn output_slot(note: &Note) -> Result<OutputNote> {
    let viewing_key = note.viewing_key.ok_or_else(|| {
        Error::InvalidNoteSelection(format!("output {} has no viewing key", note.id))
    })?;

    Ok(OutputNote {
        value: note.value.to_element(),
        secret: note.secret,
        owner: note.owner,
        viewing_key,
    })
}
