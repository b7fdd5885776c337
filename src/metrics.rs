use std::sync::atomic::{AtomicU64, Ordering};

/// Statement lifecycle counters for one store.
#[derive(Default)]
pub struct StoreMetrics {
    prepares: AtomicU64,
    executes: AtomicU64,
    rows: AtomicU64,
    finalizes: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMetricsSnapshot {
    pub prepare_count: u64,
    pub execute_count: u64,
    pub row_count: u64,
    pub finalize_count: u64,
}

impl StoreMetricsSnapshot {
    /// Statements prepared but not yet finalized at the time of the snapshot.
    pub fn live_statements(&self) -> u64 {
        self.prepare_count.saturating_sub(self.finalize_count)
    }
}

impl StoreMetrics {
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            prepare_count: self.prepares.load(Ordering::Relaxed),
            execute_count: self.executes.load(Ordering::Relaxed),
            row_count: self.rows.load(Ordering::Relaxed),
            finalize_count: self.finalizes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.prepares.store(0, Ordering::Relaxed);
        self.executes.store(0, Ordering::Relaxed);
        self.rows.store(0, Ordering::Relaxed);
        self.finalizes.store(0, Ordering::Relaxed);
    }

    pub fn record_prepare(&self) {
        self.prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute(&self) {
        self.executes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_row(&self) {
        self.rows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalize(&self) {
        self.finalizes.fetch_add(1, Ordering::Relaxed);
    }
}
