#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! The authoritative state machine of the shielded pool
//!
//! [`ShieldedLedger`] holds the pool's custody, the append-only commitment tree, the set of spent
//! nullifiers and a bounded history of recent roots. It exposes three state transitions:
//!  - [`ShieldedLedger::deposit`] moves tokens into custody and appends one commitment
//!  - [`ShieldedLedger::transact`] spends two notes into two new ones, optionally paying a fee
//!  - [`ShieldedLedger::withdraw`] does the same, and also pays an amount out of custody
//!
//! Each transition either fully applies or returns an [`Error`] and changes nothing. Proof
//! verification, participant approval and token custody are injected through the [`Verifier`],
//! [`AllowListGate`] and [`Token`] traits.

mod config;
mod error;
mod events;
mod gate;
mod ledger;
mod roots;
mod token;
mod verifier;

pub use config::LedgerConfig;
pub use error::{Error, NullifierPosition, Result};
pub use events::{EventCursor, LedgerEvent};
pub use gate::{AllowList, AllowListGate};
pub use ledger::{DepositReceipt, ShieldedLedger, SpendReceipt};
pub use roots::RootHistory;
pub use token::{InMemoryToken, Token, TokenError};
pub use verifier::Verifier;
