//! Monitor counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct MonitorMetrics {
    /// Qualifying events applied to a watched key.
    pub(crate) events_processed: AtomicU64,
    /// Records whose state was not a qualifying transition.
    pub(crate) events_ignored: AtomicU64,
    /// Qualifying events for keys nobody registered.
    pub(crate) events_unwatched: AtomicU64,
    /// Events dropped because the threshold slots were unset or inconsistent.
    pub(crate) events_unconfigured: AtomicU64,
    pub(crate) signals_emitted: AtomicU64,
    pub(crate) signals_dropped: AtomicU64,
    pub(crate) registrations_rejected: AtomicU64,
}

impl MonitorMetrics {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            events_unwatched: self.events_unwatched.load(Ordering::Relaxed),
            events_unconfigured: self.events_unconfigured.load(Ordering::Relaxed),
            signals_emitted: self.signals_emitted.load(Ordering::Relaxed),
            signals_dropped: self.signals_dropped.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_processed: u64,
    pub events_ignored: u64,
    pub events_unwatched: u64,
    pub events_unconfigured: u64,
    pub signals_emitted: u64,
    pub signals_dropped: u64,
    pub registrations_rejected: u64,
}
