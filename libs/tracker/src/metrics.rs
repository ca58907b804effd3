use std::sync::atomic::{AtomicU64, Ordering};

/// Engine-wide counters, shared between the handle and the engine task.
#[derive(Debug, Default)]
pub struct TrackerMetrics {
    items_enqueued: AtomicU64,
    items_processed: AtomicU64,
    updates_merged: AtomicU64,
    moves_applied: AtomicU64,
    notifications_emitted: AtomicU64,
    idle_parks: AtomicU64,
}

impl TrackerMetrics {
    pub fn record_enqueued(&self) {
        self.items_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self) {
        self.updates_merged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_move(&self) {
        self.moves_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_park(&self) {
        self.idle_parks.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent point-in-time copy of all counters.
    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            items_processed: self.items_processed.load(Ordering::Relaxed),
            updates_merged: self.updates_merged.load(Ordering::Relaxed),
            moves_applied: self.moves_applied.load(Ordering::Relaxed),
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
            idle_parks: self.idle_parks.load(Ordering::Relaxed),
        }
    }
}

/// Plain snapshot of [`TrackerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub items_enqueued: u64,
    pub items_processed: u64,
    pub updates_merged: u64,
    pub moves_applied: u64,
    pub notifications_emitted: u64,
    pub idle_parks: u64,
}

impl TrackerStats {
    /// Items accepted but not yet drained from the ingestion queue.
    pub fn backlog(&self) -> u64 {
        self.items_enqueued.saturating_sub(self.items_processed)
    }
}
