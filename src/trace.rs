//! Per-store diagnostic hook receiving the expanded SQL of executed statements.

use std::{fmt, sync::Arc};

use parking_lot::RwLock;

pub type TraceCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct TraceSink {
    callback: TraceCallback,
    include_rows: bool,
}

impl TraceSink {
    pub fn new(callback: TraceCallback, include_rows: bool) -> Self {
        Self {
            callback,
            include_rows,
        }
    }

    pub fn include_rows(&self) -> bool {
        self.include_rows
    }

    pub fn emit(&self, sql: &str) {
        (self.callback)(sql);
    }
}

impl fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSink")
            .field("include_rows", &self.include_rows)
            .finish_non_exhaustive()
    }
}

/// Holds at most one sink; installing a new one replaces the previous.
#[derive(Default)]
pub struct TraceSlot {
    inner: RwLock<Option<TraceSink>>,
}

impl TraceSlot {
    pub fn install(&self, sink: TraceSink) {
        *self.inner.write() = Some(sink);
    }

    pub fn clear(&self) {
        self.inner.write().take();
    }

    pub fn current(&self) -> Option<TraceSink> {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn install_replaces_previous_sink() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let slot = TraceSlot::default();

        let counter = Arc::clone(&first);
        slot.install(TraceSink::new(
            Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            false,
        ));
        let counter = Arc::clone(&second);
        slot.install(TraceSink::new(
            Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            true,
        ));

        let sink = slot.current().expect("sink");
        assert!(sink.include_rows());
        sink.emit("SELECT 1");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        slot.clear();
        assert!(slot.current().is_none());
    }
}
