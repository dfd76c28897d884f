//! mapsync core
//!
//! Real-time collaborative editing of map documents between peers that
//! talk through a relay. Every edit is stamped with a hybrid logical clock,
//! kept in an append-only operation log, and merged on the other side with
//! last-writer-wins per field.

pub mod config;
pub mod hlc;
pub mod logging;
pub mod metrics;
pub mod oplog;
pub mod reconcile;
pub mod shutdown;
pub mod sync;
pub mod test_utils;

pub use config::{Config, ConfigError};
pub use hlc::{Hlc, HlcError, HlcTimestamp};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use oplog::{NewOperation, Operation, OperationLog, Verb};
pub use reconcile::{is_superseded, Decision};
pub use sync::{ConnectionState, Message, SyncEngine, SyncError, SyncOptions, SyncResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = ConnectionState::Disconnected;
        assert!(Config::default().validate().is_ok());
    }
}
