#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![deny(missing_docs)]

//! The append-only commitment tree of the shielded pool
//!
//! Three views of the same tree live here:
//!  - [`MerkleAccumulator`] keeps every leaf, and can produce a [`MerkleProof`] for any of them.
//!    Clients use it to build spend proofs.
//!  - [`IncrementalTree`] keeps only the rightmost path. The ledger uses it to advance the root
//!    in `O(DEPTH)` per insertion.
//!  - [`TreeReplica`] wraps a [`MerkleAccumulator`] that is rebuilt from the ledger's leaf events,
//!    and refuses to serve proofs until it has been reconciled with the ledger's root.
//!
//! All three produce the same root for the same leaves:
//! ```rust
//! # use accumulator::*;
//! # use zk_primitives::Element;
//! let mut full = MerkleAccumulator::<TREE_DEPTH>::new();
//! let mut frontier = IncrementalTree::<TREE_DEPTH>::new();
//!
//! for leaf in [Element::new(1), Element::new(2), Element::new(3)] {
//!     full.insert_leaf(leaf).unwrap();
//!     frontier.insert(leaf).unwrap();
//! }
//!
//! assert_eq!(full.root(), frontier.root());
//! ```

mod error;
mod frontier;
mod hasher;
mod proof;
mod replica;
mod tree;

pub use error::Error;
pub use frontier::IncrementalTree;
pub use hasher::{CacheStats, CachedHasher, MerkleHasher, PoseidonHasher};
pub use proof::MerkleProof;
pub use replica::{SyncState, TreeReplica};
pub use tree::MerkleAccumulator;

/// The depth of the pool's commitment tree, fixed by the circuit
pub const TREE_DEPTH: usize = 20;

/// Shorthand for results in this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
