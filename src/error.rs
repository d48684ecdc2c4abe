use thiserror::Error;

/// Errors surfaced by the PCR analytics engine.
///
/// Only malformed input is reported. A zero call-side denominator or an empty
/// snapshot resolves to a well-defined result instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PcrError {
    #[error("Invalid input at row {index}: {reason}")]
    InvalidInput { index: usize, reason: String },

    #[error("Unknown option type: {0} (expected CE/CALL or PE/PUT)")]
    UnknownOptionType(String),
}

pub type Result<T> = std::result::Result<T, PcrError>;
