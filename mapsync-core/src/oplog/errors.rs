/*
    errors.rs - Error types for the operation log
*/

use crate::hlc::HlcError;
use thiserror::Error;

/// Errors that can occur while recording operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpLogError {
    /// A remote batch must contain at least one operation
    #[error("Cannot store an empty batch of remote operations")]
    EmptyBatch,

    /// The batch carries a clock reading the local clock cannot merge
    #[error("Cannot merge remote clock reading: {0}")]
    Clock(#[from] HlcError),
}

/// Result type for operation log calls
pub type OpLogResult<T> = Result<T, OpLogError>;
