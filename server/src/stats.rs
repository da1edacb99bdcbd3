//! Traffic counters, shared by every task and logged on shutdown.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RelayStats {
    datagrams_received: AtomicU64,
    datagrams_dropped: AtomicU64,
    datagrams_sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub datagrams_sent: u64,
    pub send_failures: u64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let snapshot = self.snapshot();
        info!(
            "Traffic: {} received, {} dropped, {} sent, {} send failures",
            snapshot.datagrams_received,
            snapshot.datagrams_dropped,
            snapshot.datagrams_sent,
            snapshot.send_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RelayStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_dropped();
        stats.record_sent();
        stats.record_send_failure();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                datagrams_received: 2,
                datagrams_dropped: 1,
                datagrams_sent: 1,
                send_failures: 1,
            }
        );
    }
}
