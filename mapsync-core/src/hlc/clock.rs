/*
    clock.rs - Hybrid Logical Clock

    Produces readings that never repeat and never go backwards, whatever
    the wall clock does, and folds in readings observed from peers so that
    anything created after receiving a remote operation orders after it.

    Wall time is capped at MAX_WALLTIME; past it the clock keeps counting
    logically. Remote readings beyond the cap are refused.
*/

use super::errors::HlcResult;
use super::timestamp::{validate_node_id, validate_walltime, HlcTimestamp, MAX_WALLTIME};
use super::wall_clock::{SystemClock, WallClock};
use std::sync::Arc;
use uuid::Uuid;

/// Hybrid logical clock owned by one node
#[derive(Debug, Clone)]
pub struct Hlc {
    current: HlcTimestamp,
    wall_clock: Arc<dyn WallClock>,
}

impl Hlc {
    /// Create a clock on the system time with a fresh random node id
    pub fn new() -> Self {
        Self::with_wall_clock(Arc::new(SystemClock))
    }

    /// Create a clock reading the given time source, with a fresh node id
    pub fn with_wall_clock(wall_clock: Arc<dyn WallClock>) -> Self {
        let node_id = Uuid::new_v4().to_string();
        let current = HlcTimestamp { walltime: wall_clock.now_ms().min(MAX_WALLTIME), counter: 0, node_id };
        Hlc { current, wall_clock }
    }

    /// Create a clock with an explicit node id
    pub fn with_node_id(node_id: impl Into<String>, wall_clock: Arc<dyn WallClock>) -> HlcResult<Self> {
        let node_id = node_id.into();
        validate_node_id(&node_id)?;
        let current = HlcTimestamp { walltime: wall_clock.now_ms().min(MAX_WALLTIME), counter: 0, node_id };
        Ok(Hlc { current, wall_clock })
    }

    /// Advance the clock for a local event and return the new reading
    pub fn tick(&mut self) -> HlcTimestamp {
        let now = self.wall_clock.now_ms().min(MAX_WALLTIME);
        let local = &self.current;

        let next = if now > local.walltime {
            HlcTimestamp { walltime: now, counter: 0, node_id: local.node_id.clone() }
        } else {
            HlcTimestamp::successor_of(local.walltime, local.counter, &local.node_id)
        };

        self.current = next;
        self.current.clone()
    }

    /// Advance the clock and return the reading in wire form
    pub fn tick_serialized(&mut self) -> String {
        self.tick().serialize()
    }

    /// Merge a reading observed from a peer into the local state
    ///
    /// The returned value is the new local state. It is greater than both
    /// the previous local state and `remote`. A `remote` walltime past
    /// `MAX_WALLTIME` is refused and the clock is left unchanged.
    pub fn receive(&mut self, remote: &HlcTimestamp) -> HlcResult<HlcTimestamp> {
        validate_walltime(remote.walltime)?;
        let now = self.wall_clock.now_ms().min(MAX_WALLTIME);
        let local = &self.current;
        let node_id = local.node_id.as_str();

        let next = if now > local.walltime && now > remote.walltime {
            HlcTimestamp { walltime: now, counter: 0, node_id: node_id.to_string() }
        } else if local.walltime == remote.walltime {
            let counter = local.counter.max(remote.counter);
            HlcTimestamp::successor_of(local.walltime, counter, node_id)
        } else if remote.walltime > local.walltime {
            HlcTimestamp::successor_of(remote.walltime, remote.counter, node_id)
        } else {
            HlcTimestamp::successor_of(local.walltime, local.counter, node_id)
        };

        self.current = next;
        Ok(self.current.clone())
    }

    /// Parse a wire-form reading and merge it
    pub fn receive_serialized(&mut self, raw: &str) -> HlcResult<HlcTimestamp> {
        let remote = HlcTimestamp::parse(raw)?;
        self.receive(&remote)
    }

    /// The latest reading, without advancing
    pub fn current(&self) -> &HlcTimestamp {
        &self.current
    }

    pub fn node_id(&self) -> &str {
        &self.current.node_id
    }
}

impl Default for Hlc {
    fn default() -> Self {
        Self::new()
    }
}
