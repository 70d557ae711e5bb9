//! Types shared by the ledger, the note store and the client: account addresses, token amounts,
//! the error taxonomy and the background tick worker

mod address;
mod amount;
mod error_kind;
mod tick_worker;
pub mod util;

pub use address::{Address, AddressError};
pub use amount::{Amount, AmountError};
pub use error_kind::ErrorKind;
pub use tick_worker::{TickWorker, TickWorkerTick};
