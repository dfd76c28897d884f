//! Transport seam
//!
//! The engine never touches sockets. Whatever carries bytes between peers
//! (a websocket, the in-process relay, a test double) implements
//! `Transport` for the outbound direction and feeds inbound messages to
//! `SyncEngine::receive` in delivery order.

use super::errors::SyncResult;
use super::message::Message;

/// Outbound half of a session with the relay
pub trait Transport: Send {
    /// Queue a message for delivery
    fn send(&mut self, message: Message) -> SyncResult<()>;

    /// End the session. Must be safe to call more than once.
    fn close(&mut self);
}
