use std::sync::Arc;

use drive_core::DriveError;
use tracing::{debug, warn};

use super::api::DriveApi;
use super::barrier::{CompletionBarrier, Counters};
use super::executor::{CallError, CallExecutor, DrivePolicy};
use super::model::{FolderScope, RemoteItem};

#[derive(Debug)]
pub enum RestoreOutcome {
    Restored,
    /// Dry run: the item would have been restored.
    Skipped,
    Failed(CallError<DriveError>),
}

/// Fans out one untrash call per explicitly trashed item.
#[derive(Clone)]
pub struct RestoreDispatcher {
    api: Arc<dyn DriveApi>,
    executor: Arc<CallExecutor<DrivePolicy>>,
    barrier: CompletionBarrier,
    counters: Arc<Counters>,
    dry_run: bool,
}

impl RestoreDispatcher {
    pub fn new(
        api: Arc<dyn DriveApi>,
        executor: Arc<CallExecutor<DrivePolicy>>,
        barrier: CompletionBarrier,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            api,
            executor,
            barrier,
            counters,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Schedules a restore task for `item` if it is explicitly trashed.
    pub fn restore(&self, item: RemoteItem, scope: &FolderScope) -> bool {
        if !item.explicitly_trashed {
            return false;
        }
        let this = self.clone();
        let scope = scope.clone();
        self.barrier.spawn(async move {
            match this.restore_one(&item).await {
                RestoreOutcome::Restored => {
                    debug!(item_id = %item.id, item_name = %item.name, scope = %scope, "restored");
                    this.counters.item_restored();
                }
                RestoreOutcome::Skipped => {
                    debug!(item_id = %item.id, item_name = %item.name, scope = %scope, "would restore");
                    this.counters.item_restored();
                }
                RestoreOutcome::Failed(err) => {
                    warn!(
                        item_id = %item.id,
                        item_name = %item.name,
                        scope = %scope,
                        error = %err,
                        "unable to restore item"
                    );
                    this.counters.item_failed();
                }
            }
        });
        true
    }

    async fn restore_one(&self, item: &RemoteItem) -> RestoreOutcome {
        if self.dry_run {
            return RestoreOutcome::Skipped;
        }
        match self.executor.execute(|| self.api.untrash(&item.id)).await {
            Ok(()) => RestoreOutcome::Restored,
            Err(err) => RestoreOutcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restore::backoff::Backoff;
    use crate::restore::model::ItemKind;
    use async_trait::async_trait;
    use drive_core::{FileList, StatusCode};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct UntrashRecorder {
        calls: Mutex<HashMap<String, u32>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl DriveApi for UntrashRecorder {
        async fn list_files(
            &self,
            _query: &str,
            _page_size: u32,
            _page_token: Option<&str>,
        ) -> Result<FileList, DriveError> {
            Ok(FileList::default())
        }

        async fn untrash(&self, file_id: &str) -> Result<(), DriveError> {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(file_id.to_string())
                .or_default() += 1;
            if self.failing.iter().any(|id| id == file_id) {
                return Err(DriveError::Api {
                    status: StatusCode::FORBIDDEN,
                    reason: Some("insufficientFilePermissions".into()),
                    body: String::new(),
                });
            }
            Ok(())
        }
    }

    fn item(id: &str, trashed: bool) -> RemoteItem {
        RemoteItem {
            id: id.into(),
            name: format!("{id}.txt"),
            kind: ItemKind::File,
            explicitly_trashed: trashed,
        }
    }

    fn dispatcher(api: Arc<UntrashRecorder>) -> (RestoreDispatcher, CompletionBarrier, Arc<Counters>) {
        let barrier = CompletionBarrier::new();
        let counters = Arc::new(Counters::new());
        let executor = Arc::new(CallExecutor::new(
            4,
            DrivePolicy::new(
                5,
                Arc::new(Backoff::new(
                    Duration::from_millis(1),
                    Duration::from_millis(1),
                    false,
                )),
            ),
        ));
        let dispatcher =
            RestoreDispatcher::new(api, executor, barrier.clone(), Arc::clone(&counters));
        (dispatcher, barrier, counters)
    }

    #[tokio::test]
    async fn only_explicitly_trashed_items_are_restored() {
        let api = Arc::new(UntrashRecorder::default());
        let (dispatcher, barrier, counters) = dispatcher(Arc::clone(&api));
        let scope = FolderScope::root();

        let spawned = [item("a", true), item("b", false), item("c", true)]
            .into_iter()
            .filter(|item| dispatcher.restore(item.clone(), &scope))
            .count();
        barrier.wait_all().await;

        assert_eq!(spawned, 2);
        assert_eq!(counters.items_restored(), 2);
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls.get("a"), Some(&1));
        assert_eq!(calls.get("b"), None);
        assert_eq!(calls.get("c"), Some(&1));
    }

    #[tokio::test]
    async fn terminal_failure_is_counted_and_not_retried() {
        let api = Arc::new(UntrashRecorder {
            failing: vec!["locked".into()],
            ..UntrashRecorder::default()
        });
        let (dispatcher, barrier, counters) = dispatcher(Arc::clone(&api));
        let scope = FolderScope::folder("p", "Parent");

        dispatcher.restore(item("locked", true), &scope);
        dispatcher.restore(item("ok", true), &scope);
        barrier.wait_all().await;

        assert_eq!(counters.items_restored(), 1);
        assert_eq!(counters.items_failed(), 1);
        assert_eq!(api.calls.lock().unwrap().get("locked"), Some(&1));
    }

    #[tokio::test]
    async fn dry_run_counts_without_calling_remote() {
        let api = Arc::new(UntrashRecorder::default());
        let (dispatcher, barrier, counters) = dispatcher(Arc::clone(&api));
        let dispatcher = dispatcher.dry_run(true);

        dispatcher.restore(item("a", true), &FolderScope::root());
        barrier.wait_all().await;

        assert_eq!(counters.items_restored(), 1);
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
