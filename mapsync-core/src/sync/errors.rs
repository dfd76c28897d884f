//! Error types for the sync engine

use crate::hlc::HlcError;
use crate::oplog::OpLogError;
use thiserror::Error;

/// Errors raised while synchronizing with peers
#[derive(Debug, Error)]
pub enum SyncError {
    /// An operation names a subject with no registered updater
    #[error("Unknown subject {subject:?} for {metadata}")]
    UnknownSubject { subject: String, metadata: String },

    /// The transport delivered a message kind the engine does not handle
    #[error("Received unknown message kind: {0}")]
    UnknownMessageKind(String),

    /// No session token could be obtained
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// A message could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The transport refused a message
    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Clock(#[from] HlcError),

    #[error(transparent)]
    OpLog(#[from] OpLogError),
}

impl SyncError {
    /// Fatal errors abort handling of the current message
    ///
    /// They indicate a protocol or version mismatch between peers rather
    /// than a transient condition.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::UnknownSubject { .. }
                | SyncError::UnknownMessageKind(_)
                | SyncError::Serialization(_)
                | SyncError::Clock(_)
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
