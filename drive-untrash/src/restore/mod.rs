pub mod api;
pub mod backoff;
pub mod barrier;
pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod fetcher;
pub mod model;
pub mod registry;

use std::sync::Arc;

use tracing::info;

pub use api::DriveApi;
pub use barrier::{CompletionBarrier, Counters, RunReport};
pub use engine::TraversalEngine;
pub use executor::{CallExecutor, DrivePolicy};
pub use model::FolderScope;

use dispatcher::RestoreDispatcher;
use fetcher::PageFetcher;
use registry::VisitedRegistry;

/// Knobs of one restore run.
#[derive(Clone)]
pub struct RestoreOptions {
    pub max_connections: usize,
    pub policy: DrivePolicy,
    pub page_size: u32,
    pub dry_run: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            max_connections: executor::DEFAULT_MAX_CONNECTIONS,
            policy: DrivePolicy::standard(),
            page_size: drive_core::MAX_PAGE_SIZE,
            dry_run: false,
        }
    }
}

/// Restores everything reachable from `roots` (the whole store when empty)
/// and returns once every spawned task has finished.
pub async fn run_restore(
    api: Arc<dyn DriveApi>,
    options: RestoreOptions,
    roots: Vec<FolderScope>,
) -> RunReport {
    let executor = Arc::new(CallExecutor::new(options.max_connections, options.policy));
    let barrier = CompletionBarrier::new();
    let counters = Arc::new(Counters::new());
    let fetcher =
        PageFetcher::new(Arc::clone(&api), Arc::clone(&executor)).with_page_size(options.page_size);
    let dispatcher =
        RestoreDispatcher::new(api, executor, barrier.clone(), Arc::clone(&counters))
            .dry_run(options.dry_run);
    let engine = TraversalEngine::new(
        fetcher,
        dispatcher,
        VisitedRegistry::new(),
        barrier,
        counters,
    );

    let roots = if roots.is_empty() {
        vec![FolderScope::root()]
    } else {
        roots
    };
    info!(
        roots = roots.len(),
        max_connections = options.max_connections,
        dry_run = options.dry_run,
        "starting restore"
    );
    for scope in roots {
        engine.traverse(scope);
    }
    engine.wait().await;

    let counters = engine.counters();
    RunReport {
        folders_processed: counters.folders_processed(),
        items_restored: counters.items_restored(),
        items_failed: counters.items_failed(),
        listings_failed: counters.listings_failed(),
        duplicate_references: engine.folders().duplicate_references(),
        dry_run: options.dry_run,
    }
}
