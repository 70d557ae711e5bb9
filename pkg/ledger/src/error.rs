use std::fmt;

use primitives::{Address, Amount, ErrorKind};
use zk_primitives::Element;

use crate::TokenError;

/// Which of the two nullifiers of a spend a rejection refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullifierPosition {
    First,
    Second,
}

impl fmt::Display for NullifierPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("nullifier 1"),
            Self::Second => f.write_str("nullifier 2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("not approved: {caller}")]
    NotApproved { caller: Address },

    #[error("recipient not approved: {recipient}")]
    RecipientNotApproved { recipient: Address },

    #[error("deposit amount must be greater than zero")]
    ZeroAmount,

    #[error("withdraw amount must be greater than zero")]
    ZeroWithdraw,

    #[error("relayer is not an address: {relayer}")]
    InvalidRelayer { relayer: Element },

    #[error("unknown merkle root: {root}")]
    UnknownRoot { root: Element },

    #[error("{position} already spent: {nullifier}")]
    NullifierSpent {
        position: NullifierPosition,
        nullifier: Element,
    },

    #[error("invalid proof")]
    InvalidProof,

    #[error("insufficient custody: have {available}, need {required}")]
    InsufficientCustody { available: Amount, required: Amount },

    #[error("commitment tree is full")]
    TreeFull,

    #[error("token transfer failed")]
    Token(#[from] TokenError),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotApproved { .. } | Self::RecipientNotApproved { .. } => ErrorKind::Authorization,
            Self::ZeroAmount | Self::ZeroWithdraw | Self::InvalidRelayer { .. } | Self::InvalidProof => {
                ErrorKind::Validation
            }
            Self::UnknownRoot { .. }
            | Self::NullifierSpent { .. }
            | Self::InsufficientCustody { .. } => ErrorKind::StateConflict,
            Self::TreeFull => ErrorKind::ResourceUnavailable,
            Self::Token(_) => ErrorKind::External,
        }
    }
}

impl From<accumulator::Error> for Error {
    // the ledger only appends, so the frontier can only ever report a full tree
    fn from(_: accumulator::Error) -> Self {
        Self::TreeFull
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
