use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Connection-pool counters for one endpoint at the time of a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Checkouts that found an idle connection waiting
    pub hits: u64,
    /// Checkouts that had to wait for a new or returned connection
    pub misses: u64,
    /// Checkouts or probes that ran past their deadline
    pub timeouts: u64,
    pub total_conns: u32,
    pub idle_conns: u32,
    /// Connections dropped because they failed validation
    pub stale_conns: u64,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits:{}, misses:{}, timeouts:{}, total conns:{}, idle conns:{}, stale conns:{}.",
            self.hits,
            self.misses,
            self.timeouts,
            self.total_conns,
            self.idle_conns,
            self.stale_conns
        )
    }
}

/// Lock-free counters shared between a client and its connection manager
#[derive(Debug, Default)]
pub struct AtomicPoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    timeouts: AtomicU64,
    stale_conns: AtomicU64,
}

impl AtomicPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_checkout(&self, had_idle: bool) {
        if had_idle {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_conns.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with the live connection counts from bb8
    pub fn snapshot(&self, total_conns: u32, idle_conns: u32) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            total_conns,
            idle_conns,
            stale_conns: self.stale_conns.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters (useful for testing)
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.stale_conns.store(0, Ordering::Relaxed);
    }
}
