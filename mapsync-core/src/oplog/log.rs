/*
    log.rs - Append-only operation log

    Keeps every operation this node has seen in arrival order and owns the
    node's hybrid logical clock. Arrival order differs from clock order, so
    callers that need causal order ask for `sorted_by_hlc`.

    The log is never truncated. Compaction would go here once there is a
    snapshot format to compact into.
*/

use super::errors::{OpLogError, OpLogResult};
use super::operation::{NewOperation, Operation};
use crate::hlc::{Hlc, HlcTimestamp};
use tracing::trace;

/// Append-only store of stamped operations
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    /// Clock used to stamp local operations
    clock: Hlc,

    /// All operations in arrival order
    operations: Vec<Operation>,
}

impl OperationLog {
    /// Create an empty log around the given clock
    pub fn new(clock: Hlc) -> Self {
        OperationLog { clock, operations: Vec::new() }
    }

    /// Stamp a local operation, record it, and return it for broadcast
    pub fn add_local(&mut self, op: NewOperation) -> Operation {
        let stamped = op.stamp(self.clock.tick());
        trace!(hlc = %stamped.hlc, verb = %stamped.verb, subject = %stamped.subject, "Recorded local operation");
        self.operations.push(stamped.clone());
        stamped
    }

    /// Record a batch of operations received from a peer
    ///
    /// The clock is advanced past the greatest reading in the batch, which
    /// is returned. Operations are appended verbatim; duplicates are kept.
    /// A reading the clock refuses leaves both the clock and the log as
    /// they were.
    pub fn store_remote(&mut self, ops: Vec<Operation>) -> OpLogResult<HlcTimestamp> {
        let greatest = ops
            .iter()
            .map(|op| &op.hlc)
            .max()
            .cloned()
            .ok_or(OpLogError::EmptyBatch)?;

        self.clock.receive(&greatest)?;
        trace!(count = ops.len(), greatest = %greatest, "Recorded remote operations");
        self.operations.extend(ops);

        Ok(greatest)
    }

    /// All operations, most recent clock reading first
    pub fn sorted_by_hlc(&self) -> Vec<&Operation> {
        let mut sorted: Vec<&Operation> = self.operations.iter().collect();
        sorted.sort_by(|a, b| b.hlc.cmp(&a.hlc));
        sorted
    }

    /// Operations a peer that has seen up to `since` is missing
    ///
    /// `None` means the peer has nothing, so the whole log is returned.
    pub fn operations_since(&self, since: Option<&HlcTimestamp>) -> Vec<Operation> {
        match since {
            None => self.operations.clone(),
            Some(since) => self
                .operations
                .iter()
                .filter(|op| &op.hlc > since)
                .cloned()
                .collect(),
        }
    }

    /// Greatest clock reading stored, if any
    pub fn latest_hlc(&self) -> Option<&HlcTimestamp> {
        self.operations.iter().map(|op| &op.hlc).max()
    }

    /// Operations in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn clock(&self) -> &Hlc {
        &self.clock
    }

    pub fn node_id(&self) -> &str {
        self.clock.node_id()
    }
}
