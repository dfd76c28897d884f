//! Test doubles and factories

use crate::hlc::{Hlc, HlcTimestamp, ManualClock};
use crate::oplog::{NewOperation, Operation, OperationLog};
use crate::sync::{
    FirstPeerSelector, Message, SyncEngine, SyncResult, Transport, Updater, Updaters,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Transport that keeps every message it is asked to send
///
/// Clones share the same record, so a test can keep one clone and hand
/// the other to the engine.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: Message) -> SyncResult<()> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).push(message);
        Ok(())
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Updater that records the operations it was handed
#[derive(Debug, Default)]
pub struct RecordingUpdater {
    applied: Mutex<Vec<Operation>>,
}

impl RecordingUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<Operation> {
        self.applied.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Updater for RecordingUpdater {
    fn apply_message(&self, operation: &Operation) {
        self.applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(operation.clone());
    }
}

/// Empty log whose clock has a fixed node id and reads `wall`
pub fn manual_log(node_id: &str, wall: &ManualClock) -> OperationLog {
    match Hlc::with_node_id(node_id, Arc::new(wall.clone())) {
        Ok(clock) => OperationLog::new(clock),
        Err(e) => panic!("invalid test node id {node_id:?}: {e}"),
    }
}

/// Engine with a fixed node id, a manual wall clock and deterministic
/// peer selection
pub fn manual_engine(node_id: &str, wall: &ManualClock, updater: Arc<dyn Updater>) -> SyncEngine {
    SyncEngine::with_log(manual_log(node_id, wall), Updaters::for_default_subjects(updater))
        .with_peer_selector(FirstPeerSelector)
}

/// Stamp an operation as if `node_id` had created it at `walltime`
pub fn stamped(operation: NewOperation, walltime: u64, node_id: &str) -> Operation {
    match HlcTimestamp::new(walltime, 0, node_id) {
        Ok(hlc) => operation.stamp(hlc),
        Err(e) => panic!("invalid test node id {node_id:?}: {e}"),
    }
}
