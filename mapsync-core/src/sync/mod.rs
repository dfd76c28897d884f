/*
    sync - Peer-to-peer synchronization of map documents

    `SyncEngine` is the heart of it: a state machine fed with messages
    from a `Transport`, recording every edit in an `OperationLog` and
    handing accepted operations to the `Updaters` of the document.
    `Relay` and `session` provide an in-process room to run engines in.
*/

pub mod auth;
pub mod bound;
pub mod engine;
pub mod errors;
pub mod message;
pub mod peers;
pub mod relay;
pub mod session;
pub mod transport;
pub mod updater;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use bound::{BoundSync, SyncTarget};
pub use engine::{ConnectionState, SyncEngine, SyncOptions};
pub use errors::{SyncError, SyncResult};
pub use message::{Message, PeerMessage, PeerPayload};
pub use peers::{FirstPeerSelector, PeerSelector, RandomPeerSelector, SeededPeerSelector};
pub use relay::{Inbox, Relay, RelayTransport};
pub use session::{drain, run_session};
pub use transport::Transport;
pub use updater::{EntityKey, MemoryDocument, Updater, Updaters, DEFAULT_SUBJECTS};
