/*
    relay.rs - In-process relay for one room

    Plays the part of the websocket server every peer of a map connects to.
    It hands out peer ids, keeps the member list, broadcasts operations and
    routes peer-to-peer messages. It never looks inside operations.

    Each member gets the JSON text frames addressed to it on an unbounded
    channel, in the order the relay produced them.
*/

use super::errors::{SyncError, SyncResult};
use super::message::Message;
use super::transport::Transport;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Receiving half of a relay membership
pub type Inbox = mpsc::UnboundedReceiver<String>;

#[derive(Debug)]
struct Member {
    id: String,
    outbox: mpsc::UnboundedSender<String>,
}

#[derive(Debug, Default)]
struct Room {
    /// Members in join order
    members: Vec<Member>,
}

impl Room {
    fn peer_ids(&self) -> Vec<String> {
        self.members.iter().map(|member| member.id.clone()).collect()
    }

    /// Queue a frame for one member. A member whose inbox is gone is
    /// skipped; its transport will leave the room when dropped.
    fn deliver(member: &Member, frame: &str) {
        if member.outbox.send(frame.to_string()).is_err() {
            debug!(peer = %member.id, "Inbox closed, frame dropped");
        }
    }

    fn broadcast_except(&self, sender: &str, frame: &str) {
        for member in self.members.iter().filter(|member| member.id != sender) {
            Self::deliver(member, frame);
        }
    }
}

/// A single room shared by every peer of one map
#[derive(Debug, Clone, Default)]
pub struct Relay {
    room: Arc<Mutex<Room>>,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    fn room(&self) -> MutexGuard<'_, Room> {
        self.room.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter the room
    ///
    /// The newcomer's inbox starts with a `join-response` listing every
    /// member, itself included; the others get a fresh `list-peers`.
    pub fn join(&self, token: &str) -> SyncResult<(RelayTransport, Inbox)> {
        if token.trim().is_empty() {
            return Err(SyncError::AuthenticationFailure("empty session token".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let (outbox, inbox) = mpsc::unbounded_channel();

        let mut room = self.room();
        room.members.push(Member { id: id.clone(), outbox });
        let peers = room.peer_ids();

        let response = Message::JoinResponse { uuid: id.clone(), peers: peers.clone() }.to_json()?;
        if let Some(member) = room.members.last() {
            Room::deliver(member, &response);
        }
        room.broadcast_except(&id, &Message::ListPeers { peers }.to_json()?);
        info!(peer = %id, members = room.members.len(), "Peer joined room");
        drop(room);

        Ok((RelayTransport { relay: self.clone(), id, closed: false }, inbox))
    }

    /// Forward a message sent by `sender`
    fn route(&self, sender: &str, message: Message) -> SyncResult<()> {
        let room = self.room();
        match &message {
            Message::Operation(_) => room.broadcast_except(sender, &message.to_json()?),
            Message::PeerMessage(peer_message) => {
                match room.members.iter().find(|member| member.id == peer_message.recipient) {
                    Some(member) => Room::deliver(member, &message.to_json()?),
                    None => debug!(
                        sender,
                        recipient = %peer_message.recipient,
                        "Unknown recipient, peer message dropped"
                    ),
                }
            }
            other => warn!(sender, kind = other.kind(), "Relay does not accept this message kind, dropped"),
        }
        Ok(())
    }

    fn leave(&self, id: &str) {
        let mut room = self.room();
        let before = room.members.len();
        room.members.retain(|member| member.id != id);
        if room.members.len() == before {
            return;
        }

        let peers = room.peer_ids();
        match (Message::ListPeers { peers }).to_json() {
            Ok(frame) => room.broadcast_except(id, &frame),
            Err(e) => warn!(error = %e, "Could not encode peer list"),
        }
        info!(peer = %id, members = room.members.len(), "Peer left room");
    }

    /// Ids of current members, in join order
    pub fn peer_ids(&self) -> Vec<String> {
        self.room().peer_ids()
    }

    pub fn len(&self) -> usize {
        self.room().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.room().members.is_empty()
    }
}

/// One member's sending side
///
/// Closing (or dropping) it leaves the room.
#[derive(Debug)]
pub struct RelayTransport {
    relay: Relay,
    id: String,
    closed: bool,
}

impl RelayTransport {
    /// Id the relay assigned to this member
    pub fn peer_id(&self) -> &str {
        &self.id
    }
}

impl Transport for RelayTransport {
    fn send(&mut self, message: Message) -> SyncResult<()> {
        if self.closed {
            return Err(SyncError::Transport(format!("session {} is closed", self.id)));
        }
        self.relay.route(&self.id, message)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.relay.leave(&self.id);
        }
    }
}

impl Drop for RelayTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hlc::HlcTimestamp;
    use crate::oplog::NewOperation;
    use serde_json::json;

    fn next(inbox: &mut Inbox) -> Message {
        let frame = inbox.try_recv().expect("a queued frame");
        Message::from_json(&frame).unwrap()
    }

    #[test]
    fn test_join_assigns_ids_and_announces_peers() {
        let relay = Relay::new();
        let (first, mut first_inbox) = relay.join("token").unwrap();
        let (second, mut second_inbox) = relay.join("token").unwrap();

        assert_eq!(
            next(&mut first_inbox),
            Message::JoinResponse { uuid: first.peer_id().into(), peers: vec![first.peer_id().into()] }
        );
        let everyone = vec![first.peer_id().to_string(), second.peer_id().to_string()];
        assert_eq!(
            next(&mut second_inbox),
            Message::JoinResponse { uuid: second.peer_id().into(), peers: everyone.clone() }
        );
        assert_eq!(next(&mut first_inbox), Message::ListPeers { peers: everyone });
        assert!(second_inbox.try_recv().is_err());
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let relay = Relay::new();
        let err = relay.join("  ").unwrap_err();
        assert!(matches!(err, SyncError::AuthenticationFailure(_)));
        assert!(relay.is_empty());
    }

    #[test]
    fn test_operations_go_to_everyone_else() {
        let relay = Relay::new();
        let (mut a, mut a_inbox) = relay.join("t").unwrap();
        let (_b, mut b_inbox) = relay.join("t").unwrap();
        let (_c, mut c_inbox) = relay.join("t").unwrap();
        while a_inbox.try_recv().is_ok() {}
        while b_inbox.try_recv().is_ok() {}
        while c_inbox.try_recv().is_ok() {}

        let op = NewOperation::update("map", json!("m"), "zoom", json!(3))
            .stamp(HlcTimestamp::new(1, 0, "a").unwrap());
        a.send(Message::Operation(op.clone())).unwrap();

        assert_eq!(next(&mut b_inbox), Message::Operation(op.clone()));
        assert_eq!(next(&mut c_inbox), Message::Operation(op));
        assert!(a_inbox.try_recv().is_err());
    }

    #[test]
    fn test_peer_messages_are_routed_to_recipient() {
        let relay = Relay::new();
        let (mut a, mut a_inbox) = relay.join("t").unwrap();
        let (b, mut b_inbox) = relay.join("t").unwrap();
        let (_c, mut c_inbox) = relay.join("t").unwrap();
        while b_inbox.try_recv().is_ok() {}
        while c_inbox.try_recv().is_ok() {}

        let request = Message::request_operations(a.peer_id(), b.peer_id(), None);
        a.send(request.clone()).unwrap();
        a.send(Message::request_operations(a.peer_id(), "nobody", None)).unwrap();

        assert_eq!(next(&mut b_inbox), request);
        assert!(b_inbox.try_recv().is_err());
        assert!(c_inbox.try_recv().is_err());
        while let Ok(frame) = a_inbox.try_recv() {
            assert!(!frame.contains("request-operations"));
        }
    }

    #[test]
    fn test_leaving_broadcasts_new_peer_list() {
        let relay = Relay::new();
        let (a, mut a_inbox) = relay.join("t").unwrap();
        let (mut b, _b_inbox) = relay.join("t").unwrap();
        while a_inbox.try_recv().is_ok() {}

        b.close();
        b.close();
        assert_eq!(next(&mut a_inbox), Message::ListPeers { peers: vec![a.peer_id().to_string()] });
        assert!(a_inbox.try_recv().is_err());
        assert_eq!(relay.peer_ids(), vec![a.peer_id().to_string()]);

        let err = b.send(Message::ListPeers { peers: vec![] }).unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }

    #[test]
    fn test_dropping_transport_leaves() {
        let relay = Relay::new();
        let (a, _a_inbox) = relay.join("t").unwrap();
        assert_eq!(relay.len(), 1);
        drop(a);
        assert!(relay.is_empty());
    }
}
