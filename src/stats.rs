//! Backplane statistics
//!
//! Delivery is best-effort: append and decode failures are swallowed on
//! purpose. These counters are the observability channel that keeps those
//! failures visible to operators alongside the log output.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the append path, the tail follower, and the
/// connection manager
#[derive(Debug, Default)]
pub struct BackplaneStats {
    /// Appends dispatched to the log store
    pub appends_dispatched: AtomicU64,
    /// Appends that failed after dispatch
    pub append_failures: AtomicU64,
    /// Records delivered to the local hub by the tail follower
    pub records_delivered: AtomicU64,
    /// Records skipped because they failed to decode
    pub decode_failures: AtomicU64,
    /// Times the tail follower reopened its cursor
    pub tail_restarts: AtomicU64,
    /// Sessions successfully established
    pub sessions_established: AtomicU64,
}

impl BackplaneStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appends_dispatched: self.appends_dispatched.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            tail_restarts: self.tail_restarts.load(Ordering::Relaxed),
            sessions_established: self.sessions_established.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Plain copy of the counters at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub appends_dispatched: u64,
    pub append_failures: u64,
    pub records_delivered: u64,
    pub decode_failures: u64,
    pub tail_restarts: u64,
    pub sessions_established: u64,
}
