//! Per-engine counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one engine
#[derive(Debug, Default)]
pub struct SyncStats {
    local_operations: AtomicU64,
    remote_operations: AtomicU64,
    superseded_operations: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    catchup_requests: AtomicU64,
}

/// Point-in-time copy of `SyncStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub local_operations: u64,
    pub remote_operations: u64,
    pub superseded_operations: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub catchup_requests: u64,
}

impl SyncStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_local(&self) {
        self.local_operations.fetch_add(1, Ordering::Relaxed);
        super::record_counter(super::OPERATIONS_LOCAL, 1);
    }

    pub fn add_remote(&self, count: u64) {
        self.remote_operations.fetch_add(count, Ordering::Relaxed);
        super::record_counter(super::OPERATIONS_REMOTE, count);
    }

    pub fn inc_superseded(&self) {
        self.superseded_operations.fetch_add(1, Ordering::Relaxed);
        super::record_counter(super::OPERATIONS_SUPERSEDED, 1);
    }

    pub fn inc_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        super::record_counter(super::MESSAGES_SENT, 1);
    }

    pub fn inc_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        super::record_counter(super::MESSAGES_RECEIVED, 1);
    }

    pub fn inc_catchup_requests(&self) {
        self.catchup_requests.fetch_add(1, Ordering::Relaxed);
        super::record_counter(super::CATCHUP_REQUESTS, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_operations: self.local_operations.load(Ordering::Relaxed),
            remote_operations: self.remote_operations.load(Ordering::Relaxed),
            superseded_operations: self.superseded_operations.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            catchup_requests: self.catchup_requests.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot() {
        let stats = SyncStats::new();
        stats.inc_local();
        stats.add_remote(3);
        stats.inc_superseded();
        stats.inc_sent();
        stats.inc_sent();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.local_operations, 1);
        assert_eq!(snapshot.remote_operations, 3);
        assert_eq!(snapshot.superseded_operations, 1);
        assert_eq!(snapshot.messages_sent, 2);
        assert_eq!(snapshot.messages_received, 0);
    }
}
