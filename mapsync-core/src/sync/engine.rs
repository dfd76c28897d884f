/*
    engine.rs - Protocol state machine

    One engine per open map. It records local edits, broadcasts them, and
    merges what peers send back, skipping remote writes that a newer local
    write already covers.

    Life cycle:

        Disconnected --start--> Connecting --join-response--> Joined
             ^                                                  |
             +----------------------stop------------------------+

    Right after joining, the engine asks one random peer for everything
    newer than the last catch-up it completed (`last_known_hlc`). Only
    catch-up batches move that mark; live operations do not.

    The engine is single-threaded: the caller delivers inbound messages in
    order through `receive` and must not interleave calls.
*/

use super::auth::TokenProvider;
use super::bound::{BoundSync, SyncTarget};
use super::errors::{SyncError, SyncResult};
use super::message::{Message, PeerMessage, PeerPayload};
use super::peers::{PeerSelector, RandomPeerSelector};
use super::transport::Transport;
use super::updater::Updaters;
use crate::hlc::HlcTimestamp;
use crate::metrics::{MetricsSnapshot, SyncStats, Timer, CATCHUP_DURATION};
use crate::oplog::{NewOperation, Operation, OperationLog};
use crate::reconcile::{self, Decision};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the engine is in its session with the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Joined,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Joined => "joined",
        };
        f.write_str(name)
    }
}

/// Tunables for a `SyncEngine`
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Reconcile live `operation` messages, not only catch-up batches
    pub reconcile_live_operations: bool,

    /// How long `authenticate` waits for a session token
    pub token_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            reconcile_live_operations: true,
            token_timeout: Duration::from_secs(10),
        }
    }
}

/// Synchronizes one document with its peers
pub struct SyncEngine {
    log: OperationLog,
    updaters: Updaters,
    transport: Option<Box<dyn Transport>>,
    selector: Box<dyn PeerSelector>,
    options: SyncOptions,
    stats: SyncStats,

    state: ConnectionState,
    peer_id: Option<String>,
    peers: Vec<String>,

    /// Greatest clock reading received through catch-up
    last_known_hlc: Option<HlcTimestamp>,
}

impl SyncEngine {
    /// Engine with a fresh log and a random node id
    pub fn new(updaters: Updaters) -> Self {
        Self::with_log(OperationLog::default(), updaters)
    }

    /// Engine around an existing log (and therefore an existing clock)
    pub fn with_log(log: OperationLog, updaters: Updaters) -> Self {
        Self {
            log,
            updaters,
            transport: None,
            selector: Box::new(RandomPeerSelector),
            options: SyncOptions::default(),
            stats: SyncStats::new(),
            state: ConnectionState::Disconnected,
            peer_id: None,
            peers: Vec::new(),
            last_known_hlc: None,
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the catch-up peer choice
    pub fn with_peer_selector(mut self, selector: impl PeerSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    // === Session ===

    /// Fetch a token and open a session with it
    ///
    /// Returns whether the engine is now connecting. Failing to get a token
    /// (error or timeout) or to connect leaves the engine offline; edits keep
    /// being recorded and will be shared on the next successful session.
    pub async fn authenticate<P, F>(&mut self, provider: &P, endpoint: &str, connect: F) -> bool
    where
        P: TokenProvider + ?Sized,
        F: FnOnce(&str) -> SyncResult<Box<dyn Transport>>,
    {
        let fetched = tokio::time::timeout(self.options.token_timeout, provider.fetch_token(endpoint)).await;
        let token = match fetched {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                warn!(endpoint, error = %e, "Could not get a session token, staying offline");
                return false;
            }
            Err(_) => {
                warn!(
                    endpoint,
                    timeout_ms = self.options.token_timeout.as_millis() as u64,
                    "Timed out waiting for a session token, staying offline"
                );
                return false;
            }
        };

        match connect(&token) {
            Ok(transport) => {
                self.start(transport);
                true
            }
            Err(e) => {
                warn!(endpoint, error = %e, "Could not open a session, staying offline");
                false
            }
        }
    }

    /// Attach a transport and wait for the relay's `join-response`
    ///
    /// An already attached transport is closed first.
    pub fn start(&mut self, transport: Box<dyn Transport>) {
        if self.transport.is_some() {
            self.stop();
        }
        self.transport = Some(transport);
        self.state = ConnectionState::Connecting;
        info!(node_id = %self.log.node_id(), "Sync engine started, waiting for join response");
    }

    /// Close the transport and forget the room
    ///
    /// The log and `last_known_hlc` are kept for the next session.
    pub fn stop(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        let was = self.state;
        self.state = ConnectionState::Disconnected;
        self.peer_id = None;
        self.peers.clear();
        if was != ConnectionState::Disconnected {
            info!(node_id = %self.log.node_id(), from = %was, "Sync engine stopped");
        }
    }

    // === Inbound ===

    /// Decode and handle one JSON text message
    pub fn receive_json(&mut self, raw: &str) -> SyncResult<()> {
        let message = Message::from_json(raw)?;
        self.receive(message)
    }

    /// Handle one inbound message
    ///
    /// A fatal error aborts this message only; the engine stays usable.
    pub fn receive(&mut self, message: Message) -> SyncResult<()> {
        self.stats.inc_received();
        debug!(kind = message.kind(), state = %self.state, "Handling message");

        match message {
            Message::Operation(operation) => self.on_operation(operation),
            Message::JoinResponse { uuid, peers } => self.on_join_response(uuid, peers),
            Message::ListPeers { peers } => {
                debug!(count = peers.len(), "Peer list updated");
                self.peers = peers;
                Ok(())
            }
            Message::PeerMessage(peer_message) => self.on_peer_message(peer_message),
            // Clients send `join`, they never receive it
            Message::Join { .. } => Err(SyncError::UnknownMessageKind("join".to_string())),
        }
    }

    fn on_operation(&mut self, operation: Operation) -> SyncResult<()> {
        let updater = self.updaters.get(&operation)?.clone();

        let decision = if self.options.reconcile_live_operations {
            reconcile::decide(&operation, &self.log.sorted_by_hlc())
        } else {
            Decision::Apply
        };

        self.log.store_remote(vec![operation.clone()])?;
        self.stats.add_remote(1);

        match decision {
            Decision::Apply => updater.apply_message(&operation),
            Decision::Skip => {
                self.stats.inc_superseded();
                debug!(hlc = %operation.hlc, subject = %operation.subject, "Skipping superseded live operation");
            }
        }
        Ok(())
    }

    fn on_join_response(&mut self, uuid: String, peers: Vec<String>) -> SyncResult<()> {
        if self.state != ConnectionState::Connecting {
            debug!(peer_id = %uuid, state = %self.state, "Ignoring join response outside of a connection attempt");
            return Ok(());
        }
        self.state = ConnectionState::Joined;
        self.peer_id = Some(uuid.clone());
        self.peers = peers;
        info!(peer_id = %uuid, peers = self.peers.len(), "Joined room");

        let others: Vec<String> = self.peers.iter().filter(|peer| **peer != uuid).cloned().collect();
        let Some(target) = self.selector.select(&others).and_then(|index| others.get(index)) else {
            debug!("No other peer to catch up from");
            return Ok(());
        };

        debug!(peer = %target, since = ?self.last_known_hlc, "Requesting missed operations");
        self.stats.inc_catchup_requests();
        let request = Message::request_operations(uuid, target.clone(), self.last_known_hlc.clone());
        self.send(request);
        Ok(())
    }

    fn on_peer_message(&mut self, peer_message: PeerMessage) -> SyncResult<()> {
        let PeerMessage { sender, recipient, message } = peer_message;
        match message {
            PeerPayload::RequestOperations { last_known_hlc } => {
                let operations = self.log.operations_since(last_known_hlc.as_ref());
                debug!(peer = %sender, count = operations.len(), "Answering catch-up request");
                let me = self.peer_id.clone().unwrap_or(recipient);
                self.send(Message::response_operations(me, sender, operations));
                Ok(())
            }
            PeerPayload::ResponseOperations { operations } => self.on_operations_batch(&sender, operations),
        }
    }

    fn on_operations_batch(&mut self, sender: &str, mut batch: Vec<Operation>) -> SyncResult<()> {
        if batch.is_empty() {
            debug!(peer = %sender, "Peer had nothing new");
            return Ok(());
        }
        // Reject the whole batch before touching the log
        for operation in &batch {
            self.updaters.get(operation)?;
        }

        let timer = Timer::new(CATCHUP_DURATION);
        batch.sort_by(|a, b| a.hlc.cmp(&b.hlc));

        let decisions: Vec<Decision> = {
            let local = self.log.sorted_by_hlc();
            batch.iter().map(|operation| reconcile::decide(operation, &local)).collect()
        };

        let greatest = self.log.store_remote(batch.clone())?;
        self.stats.add_remote(batch.len() as u64);
        if self.last_known_hlc.as_ref().map_or(true, |known| greatest > *known) {
            self.last_known_hlc = Some(greatest);
        }

        let mut skipped = 0usize;
        for (operation, decision) in batch.iter().zip(decisions) {
            match decision {
                Decision::Apply => self.updaters.apply(operation)?,
                Decision::Skip => {
                    skipped += 1;
                    self.stats.inc_superseded();
                    debug!(hlc = %operation.hlc, subject = %operation.subject, "Skipping superseded operation");
                }
            }
        }
        timer.stop();

        info!(
            peer = %sender,
            received = batch.len(),
            skipped,
            last_known_hlc = ?self.last_known_hlc.as_ref().map(HlcTimestamp::serialize),
            "Caught up"
        );
        Ok(())
    }

    // === Outbound ===

    /// Replace a whole entity
    pub fn upsert(&mut self, subject: impl Into<String>, metadata: Value, value: Value) -> SyncResult<Operation> {
        self.commit(NewOperation::upsert(subject, metadata, value))
    }

    /// Set one field of an entity
    pub fn update(
        &mut self,
        subject: impl Into<String>,
        metadata: Value,
        key: impl Into<String>,
        value: Value,
    ) -> SyncResult<Operation> {
        self.commit(NewOperation::update(subject, metadata, key, value))
    }

    /// Remove one field of an entity
    pub fn delete(&mut self, subject: impl Into<String>, metadata: Value, key: impl Into<String>) -> SyncResult<Operation> {
        self.commit(NewOperation::delete(subject, metadata, key))
    }

    /// Record, apply and broadcast a local edit
    pub fn commit(&mut self, operation: NewOperation) -> SyncResult<Operation> {
        if !self.updaters.contains(&operation.subject) {
            return Err(SyncError::UnknownSubject {
                subject: operation.subject,
                metadata: operation.metadata.to_string(),
            });
        }

        let stamped = self.log.add_local(operation);
        self.stats.inc_local();
        self.updaters.apply(&stamped)?;

        if self.transport.is_some() {
            self.send(Message::Operation(stamped.clone()));
        } else {
            debug!(hlc = %stamped.hlc, "Offline, operation kept for the next catch-up");
        }
        Ok(stamped)
    }

    /// Send through the transport, if any
    ///
    /// A refused send is logged, not returned: the operation is in the log
    /// and peers will get it through catch-up.
    fn send(&mut self, message: Message) {
        let Some(transport) = self.transport.as_mut() else {
            debug!(kind = message.kind(), "No transport attached, dropping message");
            return;
        };
        let kind = message.kind();
        match transport.send(message) {
            Ok(()) => self.stats.inc_sent(),
            Err(e) => warn!(kind, error = %e, "Transport refused message"),
        }
    }

    // === Binding ===

    /// Sync handle pre-filled with one entity's subject and metadata
    pub fn bind(&mut self, subject: impl Into<String>, metadata: Value) -> BoundSync<'_> {
        BoundSync::new(self, subject.into(), metadata)
    }

    /// `bind` using the target's own subject and metadata
    pub fn bind_target<T: SyncTarget + ?Sized>(&mut self, target: &T) -> BoundSync<'_> {
        let (subject, metadata) = target.sync_metadata();
        self.bind(subject, metadata)
    }

    // === Accessors ===

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Id the relay gave us, once joined
    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.as_deref()
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn last_known_hlc(&self) -> Option<&HlcTimestamp> {
        self.last_known_hlc.as_ref()
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    pub fn updaters(&self) -> &Updaters {
        &self.updaters
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn stats(&self) -> MetricsSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("node_id", &self.log.node_id())
            .field("state", &self.state)
            .field("peer_id", &self.peer_id)
            .field("peers", &self.peers)
            .field("operations", &self.log.len())
            .field("last_known_hlc", &self.last_known_hlc)
            .finish()
    }
}
