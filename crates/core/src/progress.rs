use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Incremental progress counters for one orchestrator stage. Cheap to
/// share across worker tasks: each completion just bumps a counter and logs
/// at a coarse interval, rather than pushing through a channel nobody reads
/// until the stage ends.
#[derive(Debug, Default)]
pub struct StageProgress {
    label: String,
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl StageProgress {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Record one task finishing, successfully or not, and log every 50
    /// completions (and always on the last one) so a long run still shows
    /// signs of life without flooding the log.
    pub fn record(&self, ok: bool) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if !ok {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        if done % 50 == 0 || done == self.total {
            info!(stage = %self.label, completed = done, total = self.total, failed = self.failed.load(Ordering::Relaxed), "stage progress");
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}
