use std::time::Duration;

use primitives::{Amount, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("insufficient note value: have {available}, need {required}")]
    InsufficientNoteValue { available: Amount, required: Amount },

    #[error("invalid note selection: {0}")]
    InvalidNoteSelection(String),

    #[error("tree replica is not synced with the ledger")]
    TreeNotSynced,

    #[error("leaf {leaf_index} holds a different commitment than the note")]
    CommitmentMismatch { leaf_index: u64 },

    #[error("prover timed out after {0:?}")]
    ProverTimeout(Duration),

    #[error("prover failed: {0}")]
    Prover(String),

    #[error("malformed prover response: {0}")]
    MalformedProverResponse(String),

    #[error("ledger rejected the request")]
    Ledger(#[from] ledger::Error),

    #[error("tree error")]
    Tree(#[from] accumulator::Error),

    #[error("note store error")]
    Notes(#[from] notes::Error),

    #[error("http error")]
    Http(#[from] reqwest::Error),

    #[error("serde_json error")]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientNoteValue { .. } | Self::InvalidNoteSelection(_) => {
                ErrorKind::Validation
            }
            Self::TreeNotSynced => ErrorKind::ResourceUnavailable,
            Self::CommitmentMismatch { .. } => ErrorKind::StateConflict,
            Self::Ledger(err) => err.kind(),
            Self::Tree(err) => match err {
                accumulator::Error::NotSynced
                | accumulator::Error::IndexOutOfRange { .. }
                | accumulator::Error::TreeFull { .. } => ErrorKind::ResourceUnavailable,
                accumulator::Error::OutOfOrderLeaf { .. }
                | accumulator::Error::ConflictingLeaf { .. }
                | accumulator::Error::LeafCountMismatch { .. }
                | accumulator::Error::RootMismatch { .. } => ErrorKind::StateConflict,
            },
            Self::Notes(err) => match err {
                notes::Error::NotSpendable { .. } | notes::Error::DuplicateNote(_) => {
                    ErrorKind::StateConflict
                }
                notes::Error::UnknownNote(_) | notes::Error::UnknownLease(_) => {
                    ErrorKind::ResourceUnavailable
                }
                notes::Error::LeaseOutOfRange | notes::Error::NotPending { .. } => {
                    ErrorKind::Validation
                }
                _ => ErrorKind::External,
            },
            Self::ProverTimeout(_)
            | Self::Prover(_)
            | Self::MalformedProverResponse(_)
            | Self::Http(_)
            | Self::SerdeJson(_) => ErrorKind::External,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_kinds_pass_through() {
        let err = Error::from(ledger::Error::UnknownRoot {
            root: zk_primitives::Element::ONE,
        });
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        assert_eq!(
            Error::from(accumulator::Error::NotSynced).kind(),
            ErrorKind::ResourceUnavailable
        );
        assert!(Error::ProverTimeout(Duration::from_secs(1)).kind().is_retryable());
    }
}
