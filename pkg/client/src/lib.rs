#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! The client side of the shielded pool
//!
//! A [`ShieldedWallet`] ties together the pieces a holder needs to use the pool:
//!  - a [`TreeReplica`](accumulator::TreeReplica) rebuilt from the ledger's leaf events,
//!  - a shared [`NoteStore`](notes::NoteStore) holding note secrets,
//!  - a [`ProofInputAssembler`] that turns notes into [`CircuitInputs`],
//!  - a [`Prover`] (usually an [`HttpProver`]) and a [`LedgerClient`] to submit to.

mod assembler;
mod circuit;
mod config;
mod error;
mod inputs;
mod ledger_client;
mod prover;
mod wallet;

pub use assembler::{select_notes, AssembledSpend, ProofInputAssembler, DUMMY_LEAF_INDEX};
pub use circuit::{Circuit, PoseidonCircuit};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use inputs::{CircuitInputs, InputNote, OutputNote};
pub use ledger_client::{LedgerClient, LocalLedgerClient};
pub use prover::{HttpProver, Proof, Prover};
pub use wallet::{ShieldedWallet, SpendKind, SpendOutcome, SpendRequest};
