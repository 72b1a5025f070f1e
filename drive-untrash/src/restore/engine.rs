use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, error, info};

use super::barrier::{CompletionBarrier, Counters};
use super::dispatcher::RestoreDispatcher;
use super::fetcher::PageFetcher;
use super::model::FolderScope;
use super::registry::VisitedRegistry;

/// Walks folder scopes page by page, restoring trashed items and spawning
/// one traversal per subfolder.
///
/// Each folder id is listed at most once per engine, no matter how many
/// parents reference it or how many times it is passed as a root.
#[derive(Clone)]
pub struct TraversalEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    fetcher: PageFetcher,
    dispatcher: RestoreDispatcher,
    folders: VisitedRegistry,
    items: VisitedRegistry,
    barrier: CompletionBarrier,
    counters: Arc<Counters>,
}

impl TraversalEngine {
    pub fn new(
        fetcher: PageFetcher,
        dispatcher: RestoreDispatcher,
        folders: VisitedRegistry,
        barrier: CompletionBarrier,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                fetcher,
                dispatcher,
                folders,
                items: VisitedRegistry::new(),
                barrier,
                counters,
            }),
        }
    }

    /// Spawns the traversal of `scope`. The task is registered with the
    /// barrier before this returns.
    pub fn traverse(&self, scope: FolderScope) {
        spawn_walk(&self.inner, scope);
    }

    pub fn counters(&self) -> &Counters {
        &self.inner.counters
    }

    pub fn folders(&self) -> &VisitedRegistry {
        &self.inner.folders
    }

    pub async fn wait(&self) {
        self.inner.barrier.wait_all().await;
    }
}

fn spawn_walk(inner: &Arc<EngineInner>, scope: FolderScope) {
    inner.barrier.spawn(walk(Arc::clone(inner), scope));
}

fn walk(inner: Arc<EngineInner>, scope: FolderScope) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        if !scope.is_root() && !inner.folders.claim(scope.id()) {
            debug!(scope = %scope, "already processed, skipping");
            return;
        }
        inner.counters.folder_processed();
        debug!(scope = %scope, "restore trash in folder");

        let mut token: Option<String> = None;
        let mut listed = 0usize;
        loop {
            let page = match inner.fetcher.fetch_page(&scope, token.as_deref()).await {
                Ok(page) => page,
                Err(err) => {
                    error!(scope_id = %scope.id(), scope_name = %scope.name(), error = %err, "unable to list folder");
                    inner.counters.listing_failed();
                    return;
                }
            };
            listed += page.items.len();
            debug!(
                scope = %scope,
                entries = page.items.len(),
                total = listed,
                "got page"
            );

            let next = page.next_token.filter(|t| !t.is_empty());
            for item in page.items {
                if item.is_folder() {
                    spawn_walk(&inner, item.as_scope());
                }
                if item.explicitly_trashed && inner.items.claim(&item.id) {
                    inner.dispatcher.restore(item, &scope);
                }
            }

            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        if scope.is_root() {
            info!(entries = listed, "store root listing complete");
        }
    })
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
