//! Wire messages exchanged through the relay
//!
//! Every message is a JSON object discriminated by its `kind` field.
//! Peer-to-peer payloads carried inside `peermessage` are discriminated by
//! `verb`. The relay only looks at `kind`, `recipient` and `token`; the rest
//! is opaque to it.

use super::errors::{SyncError, SyncResult};
use crate::hlc::HlcTimestamp;
use crate::oplog::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const KIND_JOIN: &str = "join";
const KIND_OPERATION: &str = "operation";
const KIND_JOIN_RESPONSE: &str = "join-response";
const KIND_LIST_PEERS: &str = "list-peers";
const KIND_PEER_MESSAGE: &str = "peermessage";

const KNOWN_KINDS: [&str; 5] = [
    KIND_JOIN,
    KIND_OPERATION,
    KIND_JOIN_RESPONSE,
    KIND_LIST_PEERS,
    KIND_PEER_MESSAGE,
];

/// Envelope for everything that crosses the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Message {
    /// First message of a session, client to relay
    #[serde(rename = "join")]
    Join { token: String },

    /// A single live operation, broadcast to every other peer
    #[serde(rename = "operation")]
    Operation(Operation),

    /// Relay's answer to `join`: our id and everyone in the room
    #[serde(rename = "join-response")]
    JoinResponse { uuid: String, peers: Vec<String> },

    /// Room membership changed
    #[serde(rename = "list-peers")]
    ListPeers { peers: Vec<String> },

    /// Addressed to a single peer, routed by the relay
    #[serde(rename = "peermessage")]
    PeerMessage(PeerMessage),
}

/// Message routed from one peer to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerMessage {
    pub sender: String,
    pub recipient: String,
    pub message: PeerPayload,
}

/// Catch-up protocol between two peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verb")]
pub enum PeerPayload {
    /// Ask for every operation newer than `last_known_hlc` (all of them if absent)
    #[serde(rename = "request-operations")]
    RequestOperations {
        #[serde(rename = "lastKnownHLC", default, skip_serializing_if = "Option::is_none")]
        last_known_hlc: Option<HlcTimestamp>,
    },

    /// Answer to `request-operations`
    #[serde(rename = "response-operations")]
    ResponseOperations { operations: Vec<Operation> },
}

impl Message {
    /// Build a catch-up request
    pub fn request_operations(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        last_known_hlc: Option<HlcTimestamp>,
    ) -> Self {
        Message::PeerMessage(PeerMessage {
            sender: sender.into(),
            recipient: recipient.into(),
            message: PeerPayload::RequestOperations { last_known_hlc },
        })
    }

    /// Build a catch-up response
    pub fn response_operations(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        operations: Vec<Operation>,
    ) -> Self {
        Message::PeerMessage(PeerMessage {
            sender: sender.into(),
            recipient: recipient.into(),
            message: PeerPayload::ResponseOperations { operations },
        })
    }

    /// The wire `kind` of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join { .. } => KIND_JOIN,
            Message::Operation(_) => KIND_OPERATION,
            Message::JoinResponse { .. } => KIND_JOIN_RESPONSE,
            Message::ListPeers { .. } => KIND_LIST_PEERS,
            Message::PeerMessage(_) => KIND_PEER_MESSAGE,
        }
    }

    /// Decode a JSON text message
    pub fn from_json(raw: &str) -> SyncResult<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value
    ///
    /// A `kind` this crate does not know is reported as
    /// `SyncError::UnknownMessageKind` rather than a generic decode error.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::Serialization("message has no string `kind`".to_string()))?;

        if !KNOWN_KINDS.contains(&kind) {
            return Err(SyncError::UnknownMessageKind(kind.to_string()));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Encode as a JSON text message
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
