//! Several engines sharing one in-process relay
//!
//! Everything runs on the calling thread: `settle` keeps handing queued
//! frames to their engines until no peer has anything left to read.

use super::fixtures::manual_log;
use crate::config::Config;
use crate::hlc::ManualClock;
use crate::sync::{
    drain, Inbox, MemoryDocument, Relay, SeededPeerSelector, SyncEngine, SyncOptions, SyncResult,
    TokenProvider, Transport, Updaters, DEFAULT_SUBJECTS,
};
use std::sync::Arc;
use tracing::debug;

/// One member of a `SimulatedRoom`
#[derive(Debug)]
pub struct SimulatedPeer {
    pub engine: SyncEngine,
    pub document: Arc<MemoryDocument>,
    pub wall: ManualClock,
    inbox: Option<Inbox>,
}

impl SimulatedPeer {
    pub fn is_online(&self) -> bool {
        self.inbox.is_some()
    }
}

/// A relay and the peers connected to it
#[derive(Debug)]
pub struct SimulatedRoom {
    relay: Relay,
    peers: Vec<SimulatedPeer>,
    seed: u64,
    options: SyncOptions,
    subjects: Vec<String>,
}

impl Default for SimulatedRoom {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedRoom {
    /// `seed` drives every peer's catch-up choice
    pub fn new(seed: u64) -> Self {
        Self::with_options(seed, SyncOptions::default(), DEFAULT_SUBJECTS)
    }

    /// Room whose peers run with `options` and have updaters for `subjects`
    pub fn with_options<I, S>(seed: u64, options: SyncOptions, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relay: Relay::new(),
            peers: Vec::new(),
            seed,
            options,
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }

    /// Room whose peers follow the node and sync sections of `config`
    pub fn from_config(config: &Config, seed: u64) -> Self {
        Self::with_options(seed, config.sync_options(), config.node.subjects.iter().cloned())
    }

    /// Subjects every peer has an updater for
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    /// Add an offline peer whose wall clock starts at `start_ms`
    pub fn add_peer(&mut self, node_id: &str, start_ms: u64) -> usize {
        let wall = ManualClock::new(start_ms);
        let document = Arc::new(MemoryDocument::new());
        let index = self.peers.len();
        let updaters = Updaters::for_subjects(self.subjects.iter().cloned(), document.clone());
        let engine = SyncEngine::with_log(manual_log(node_id, &wall), updaters)
            .with_options(self.options.clone())
            .with_peer_selector(SeededPeerSelector::new(self.seed.wrapping_add(index as u64)));
        self.peers.push(SimulatedPeer { engine, document, wall, inbox: None });
        index
    }

    /// Connect a peer to the relay
    pub fn connect(&mut self, index: usize) -> SyncResult<()> {
        let (transport, inbox) = self.relay.join("simulation")?;
        let peer = &mut self.peers[index];
        peer.engine.start(Box::new(transport));
        peer.inbox = Some(inbox);
        Ok(())
    }

    /// Connect a peer the way a client does: fetch a token, then join
    ///
    /// Returns whether the peer is now connecting. On failure the peer
    /// stays offline.
    pub async fn connect_with_token<P>(&mut self, index: usize, provider: &P, endpoint: &str) -> bool
    where
        P: TokenProvider + ?Sized,
    {
        let relay = &self.relay;
        let peer = &mut self.peers[index];
        let mut joined = None;
        let connected = peer
            .engine
            .authenticate(provider, endpoint, |token: &str| {
                let (transport, inbox) = relay.join(token)?;
                joined = Some(inbox);
                Ok(Box::new(transport) as Box<dyn Transport>)
            })
            .await;
        if connected {
            peer.inbox = joined;
        }
        connected
    }

    /// Disconnect a peer; it keeps editing offline
    pub fn disconnect(&mut self, index: usize) {
        let peer = &mut self.peers[index];
        peer.engine.stop();
        peer.inbox = None;
    }

    /// Deliver frames until every inbox is empty
    ///
    /// Returns how many frames were handled in total.
    pub fn settle(&mut self) -> SyncResult<usize> {
        let mut total = 0;
        loop {
            let mut handled = 0;
            for peer in &mut self.peers {
                if let Some(inbox) = peer.inbox.as_mut() {
                    handled += drain(&mut peer.engine, inbox)?;
                }
            }
            if handled == 0 {
                debug!(frames = total, "Room settled");
                return Ok(total);
            }
            total += handled;
        }
    }

    pub fn peer(&self, index: usize) -> &SimulatedPeer {
        &self.peers[index]
    }

    pub fn peer_mut(&mut self, index: usize) -> &mut SimulatedPeer {
        &mut self.peers[index]
    }

    pub fn peers(&self) -> &[SimulatedPeer] {
        &self.peers
    }

    pub fn documents(&self) -> Vec<&MemoryDocument> {
        self.peers.iter().map(|peer| peer.document.as_ref()).collect()
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
