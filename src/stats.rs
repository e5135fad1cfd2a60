//! Link counters.
//!
//! Shared between the engine, the host adapter (STATUS) and the optional
//! stats server. All fields are atomics so readers on other threads never
//! block the engine.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Cumulative counters of one link endpoint.
#[derive(Debug)]
pub struct LinkStats {
    start_time: Instant,
    /// Outbound messages delivered (fully acknowledged).
    pub tx_count: AtomicUsize,
    /// Inbound messages delivered to the host.
    pub rx_count: AtomicUsize,
    /// Matching ACK/FRAG_ACK frames received.
    pub ack_count: AtomicUsize,
    /// Retransmissions.
    pub retry_count: AtomicUsize,
    /// Outbound messages that ran out of retries.
    pub failed_sends: AtomicUsize,
    /// Partial inbound messages dropped on timeout.
    pub expired_reassemblies: AtomicUsize,
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            tx_count: AtomicUsize::new(0),
            rx_count: AtomicUsize::new(0),
            ack_count: AtomicUsize::new(0),
            retry_count: AtomicUsize::new(0),
            failed_sends: AtomicUsize::new(0),
            expired_reassemblies: AtomicUsize::new(0),
        }
    }

    /// Milliseconds since the counters were created.
    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn record_tx(&self) {
        self.tx_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rx(&self) {
        self.rx_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ack(&self) {
        self.ack_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_send(&self) {
        self.failed_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_reassembly(&self) {
        self.expired_reassemblies.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_ms: self.uptime_ms(),
            tx_count: self.tx_count.load(Ordering::Relaxed),
            rx_count: self.rx_count.load(Ordering::Relaxed),
            ack_count: self.ack_count.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            failed_sends: self.failed_sends.load(Ordering::Relaxed),
            expired_reassemblies: self.expired_reassemblies.load(Ordering::Relaxed),
        }
    }

    /// Serialize all counters to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values read at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_ms: u64,
    pub tx_count: usize,
    pub rx_count: usize,
    pub ack_count: usize,
    pub retry_count: usize,
    pub failed_sends: usize,
    pub expired_reassemblies: usize,
}
