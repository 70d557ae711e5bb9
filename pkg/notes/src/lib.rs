//! Local storage for a holder's notes
//!
//! A note is created [`Pending`](NoteState::Pending) when it is staged for a deposit or as the
//! output of a spend, becomes [`Unspent`](NoteState::Unspent) once the ledger confirms its leaf
//! index, may be [`Reserved`](NoteState::Reserved) under a lease while a spend is in flight, and
//! ends [`Spent`](NoteState::Spent).
//!
//! There is no recovery path: a note's secret only exists here, so losing the repository loses the
//! funds.

mod error;
mod note;
mod reaper;
mod repository;
mod store;

#[cfg(feature = "storage")]
pub mod storage;

pub use error::{Error, Result};
pub use note::{owner_for_address, LeaseId, Note, NoteId, NoteState, SpendIntent};
pub use reaper::LeaseReaper;
pub use repository::{MemoryRepository, NoteRepository};
pub use store::{NoteStore, Reservation};
