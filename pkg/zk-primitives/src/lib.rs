#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::match_bool)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![deny(missing_docs)]

//! Field elements, hashing and the public input layout shared by the shielded pool circuit, the
//! ledger that verifies its proofs, and the clients that build them

mod element;
mod error;
mod hash;
mod public_inputs;

pub use element::Element;
pub use error::Error;
pub use hash::hash_merge;
pub use public_inputs::PublicInputs;

/// The base element used by cryptographic operations
///
/// This is (roughly) an integer modulo `p` where `p` is [`Element::MODULUS`]
pub type Base = poseidon_circuit::Bn256Fr;
