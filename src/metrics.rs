//! Hot-path performance tracking.
//!
//! Counters are plain relaxed atomics; min/max latency use
//! compare-exchange retry loops so concurrent producer threads can record
//! without locks. The tracker is a pure observer: reporting reads it,
//! nothing reads back from it into the engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

use crate::types::timestamp_ns;

pub struct PerfTracker {
    updates_total: AtomicU64,
    updates_dropped: AtomicU64,
    latency_total_ns: AtomicU64,
    latency_min_ns: AtomicU64,
    latency_max_ns: AtomicU64,
    opportunities: AtomicU64,
    trades_executed: AtomicU64,
    started_at_ns: u64,
}

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Serialize)]
pub struct PerfSnapshot {
    pub updates_total: u64,
    pub updates_dropped: u64,
    pub avg_latency_ns: u64,
    /// Zero when no update has been recorded yet.
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
    pub opportunities: u64,
    pub trades_executed: u64,
    pub runtime_secs: f64,
    pub updates_per_sec: f64,
}

impl PerfTracker {
    pub fn new() -> Self {
        Self {
            updates_total: AtomicU64::new(0),
            updates_dropped: AtomicU64::new(0),
            latency_total_ns: AtomicU64::new(0),
            latency_min_ns: AtomicU64::new(u64::MAX),
            latency_max_ns: AtomicU64::new(0),
            opportunities: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            started_at_ns: timestamp_ns(),
        }
    }

    /// Record one processed update's end-to-end latency.
    pub fn record_update_latency(&self, latency_ns: u64) {
        self.updates_total.fetch_add(1, Ordering::Relaxed);
        self.latency_total_ns.fetch_add(latency_ns, Ordering::Relaxed);

        let mut current = self.latency_min_ns.load(Ordering::Relaxed);
        while latency_ns < current {
            match self.latency_min_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let mut current = self.latency_max_ns.load(Ordering::Relaxed);
        while latency_ns > current {
            match self.latency_max_ns.compare_exchange_weak(
                current,
                latency_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Count an update dropped before reaching a book (unknown key).
    pub fn record_dropped_update(&self) {
        self.updates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opportunity(&self) {
        self.opportunities.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trade_executed(&self) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn updates_total(&self) -> u64 {
        self.updates_total.load(Ordering::Relaxed)
    }

    pub fn opportunities(&self) -> u64 {
        self.opportunities.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        let updates = self.updates_total.load(Ordering::Relaxed);
        let runtime_ns = timestamp_ns().saturating_sub(self.started_at_ns);
        let runtime_secs = runtime_ns as f64 / 1e9;
        let min = self.latency_min_ns.load(Ordering::Relaxed);

        PerfSnapshot {
            updates_total: updates,
            updates_dropped: self.updates_dropped.load(Ordering::Relaxed),
            avg_latency_ns: if updates > 0 {
                self.latency_total_ns.load(Ordering::Relaxed) / updates
            } else {
                0
            },
            min_latency_ns: if min == u64::MAX { 0 } else { min },
            max_latency_ns: self.latency_max_ns.load(Ordering::Relaxed),
            opportunities: self.opportunities.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            runtime_secs,
            updates_per_sec: if runtime_secs > 0.0 {
                updates as f64 / runtime_secs
            } else {
                0.0
            },
        }
    }

    /// Log a human-readable summary of the current snapshot.
    pub fn log_summary(&self) {
        let s = self.snapshot();
        if s.updates_total == 0 {
            info!("no updates processed yet");
            return;
        }
        info!("=== ENGINE PERFORMANCE ===");
        info!("  runtime: {:.1}s", s.runtime_secs);
        info!(
            "  updates: {} ({:.1}/s, {} dropped)",
            s.updates_total, s.updates_per_sec, s.updates_dropped
        );
        info!(
            "  latency: avg {}us / min {}us / max {}us",
            s.avg_latency_ns / 1_000,
            s.min_latency_ns / 1_000,
            s.max_latency_ns / 1_000
        );
        info!(
            "  opportunities: {} ({} executed)",
            s.opportunities, s.trades_executed
        );
        if s.opportunities > 0 {
            info!(
                "  execution rate: {:.1}%",
                s.trades_executed as f64 / s.opportunities as f64 * 100.0
            );
        }
    }
}

impl Default for PerfTracker {
    fn default() -> Self {
        Self::new()
    }
}
