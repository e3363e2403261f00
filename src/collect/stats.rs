use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what happened to the status events a collector saw
#[derive(Debug, Default)]
pub struct CollectorStats {
    events_received: AtomicU64,
    results_persisted: AtomicU64,
    duplicates_dropped: AtomicU64,
    errors_dropped: AtomicU64,
    informational: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStatsSnapshot {
    pub events_received: u64,
    pub results_persisted: u64,
    pub duplicates_dropped: u64,
    pub errors_dropped: u64,
    /// Non-terminal updates, logged only
    pub informational: u64,
}

impl CollectorStatsSnapshot {
    /// Events consumed without producing a result row
    pub fn dropped(&self) -> u64 {
        self.duplicates_dropped + self.errors_dropped
    }
}

impl CollectorStats {
    pub(crate) fn record_event(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.results_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.duplicates_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_informational(&self) {
        self.informational.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CollectorStatsSnapshot {
        CollectorStatsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            results_persisted: self.results_persisted.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            errors_dropped: self.errors_dropped.load(Ordering::Relaxed),
            informational: self.informational.load(Ordering::Relaxed),
        }
    }
}
