use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The coarse class of a failure, shared by every crate in the pool
///
/// Callers decide whether to retry, resync or give up from this alone
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// The request was malformed: zero amounts, wrong arity
    Validation,
    /// A participant is not on the allow-list
    Authorization,
    /// The request conflicts with ledger state: spent nullifier, unknown root
    StateConflict,
    /// Something the request needs is missing or not ready yet
    ResourceUnavailable,
    /// A collaborator failed, such as the prover or the note database
    External,
}

impl ErrorKind {
    /// Whether retrying the same request unchanged can succeed
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ResourceUnavailable | Self::External)
    }
}
