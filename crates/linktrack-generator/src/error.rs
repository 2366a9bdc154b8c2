use thiserror::Error;

/// Errors returned when a generator is configured.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid code length {length}; expected {min}..={max}")]
    InvalidLength { length: usize, min: usize, max: usize },
    #[error("alphabet must not be empty")]
    EmptyAlphabet,
    #[error("alphabet character {0:?} is not allowed in short codes")]
    InvalidAlphabet(char),
}
