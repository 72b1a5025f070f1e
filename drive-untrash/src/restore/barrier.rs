use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::task::{TaskTracker, task_tracker::TaskTrackerToken};

/// Tracks every traversal and restore task of a run.
///
/// The set of tasks grows while the run is in progress: a task always
/// registers its children before it completes, so the outstanding count
/// cannot reach zero while work remains.
#[derive(Debug, Clone, Default)]
pub struct CompletionBarrier {
    tracker: TaskTracker,
}

/// Held by a running task; dropping it marks the task complete.
pub type TaskGuard = TaskTrackerToken;

impl CompletionBarrier {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    pub fn register(&self) -> TaskGuard {
        self.tracker.token()
    }

    /// Spawns `task` on the runtime, registered until it returns or panics.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for all registered tasks, including ones registered during the
    /// wait.
    pub async fn wait_all(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    folders_processed: AtomicU64,
    items_restored: AtomicU64,
    items_failed: AtomicU64,
    listings_failed: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folder_processed(&self) {
        self.folders_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_restored(&self) {
        self.items_restored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn listing_failed(&self) {
        self.listings_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn folders_processed(&self) -> u64 {
        self.folders_processed.load(Ordering::Relaxed)
    }

    pub fn items_restored(&self) -> u64 {
        self.items_restored.load(Ordering::Relaxed)
    }

    pub fn items_failed(&self) -> u64 {
        self.items_failed.load(Ordering::Relaxed)
    }

    pub fn listings_failed(&self) -> u64 {
        self.listings_failed.load(Ordering::Relaxed)
    }
}

/// Final counts of a run, read after the barrier drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub folders_processed: u64,
    pub items_restored: u64,
    pub items_failed: u64,
    pub listings_failed: u64,
    pub duplicate_references: u64,
    pub dry_run: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run {
            "would restore"
        } else {
            "restored"
        };
        write!(
            f,
            "processed {} folders, {verb} {} items",
            self.folders_processed, self.items_restored
        )?;
        if self.items_failed > 0 || self.listings_failed > 0 {
            write!(
                f,
                " ({} restore failures, {} listing failures)",
                self.items_failed, self.listings_failed
            )?;
        }
        Ok(())
    }
}
