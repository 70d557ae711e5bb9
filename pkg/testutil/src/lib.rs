//! Fakes and harnesses shared by the workspace's tests
//!
//! Nothing here is cryptographically meaningful. [`LocalProver`] checks the same relations the
//! spend circuit constrains and signs off with a hash of the public inputs, which
//! [`LocalVerifier`] recomputes on the ledger side.

mod pool;
mod port_pool;
pub mod prove_server;
mod prover;
mod verifier;

pub use pool::{TestLedger, TestPool, TestWallet};
pub use port_pool::{Port, PortPool};
pub use prover::{proof_bytes, LocalProver, ScriptedProver, Step};
pub use verifier::{AcceptAll, LocalVerifier, RejectAll};

use primitives::Address;

/// A test address, `n` in the low bytes
#[must_use]
pub fn address(n: u64) -> Address {
    Address::from_low_u64_be(n)
}
