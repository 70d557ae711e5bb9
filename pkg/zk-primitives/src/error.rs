/// Errors produced when decoding elements and public inputs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The string was neither `0x`-prefixed hex nor decimal
    #[error("invalid element: {0:?}")]
    InvalidElement(String),

    /// A byte string or list had the wrong number of entries
    #[error("expected {expected} entries, got {got}")]
    WrongLength {
        /// The required length
        expected: usize,
        /// The length that was provided
        got: usize,
    },
}
