/*
    errors.rs - Error types for the clock subsystem
*/

use thiserror::Error;

/// Errors raised while parsing or constructing clock readings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HlcError {
    /// A serialized reading could not be parsed
    #[error("Malformed HLC timestamp {raw:?}: {reason}")]
    Malformed { raw: String, reason: String },

    /// Walltimes past the 15-digit wire width would break string ordering
    #[error("Walltime {0} exceeds the maximum of {max}", max = crate::hlc::timestamp::MAX_WALLTIME)]
    WalltimeOutOfRange(u64),

    /// Node ids must be non-empty and must not contain the field separator
    #[error("Invalid node id {0:?}")]
    InvalidNodeId(String),
}

impl HlcError {
    pub(crate) fn malformed(raw: &str, reason: impl Into<String>) -> Self {
        HlcError::Malformed { raw: raw.to_string(), reason: reason.into() }
    }
}

/// Result type for clock operations
pub type HlcResult<T> = Result<T, HlcError>;
