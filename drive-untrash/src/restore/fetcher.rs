use std::sync::Arc;

use drive_core::{DriveError, FOLDER_MIME_TYPE, MAX_PAGE_SIZE};
use thiserror::Error;

use super::api::DriveApi;
use super::executor::{CallError, CallExecutor, DrivePolicy};
use super::model::{FolderScope, Page, RemoteItem};

#[derive(Debug, Error)]
#[error("unable to retrieve listing for {scope}: {source}")]
pub struct FetchError {
    pub scope: FolderScope,
    #[source]
    pub source: CallError<DriveError>,
}

/// Fetches one listing page at a time, restricted to folders and trashed
/// items so pages stay small no matter how large the store is.
pub struct PageFetcher {
    api: Arc<dyn DriveApi>,
    executor: Arc<CallExecutor<DrivePolicy>>,
    page_size: u32,
}

impl PageFetcher {
    pub fn new(api: Arc<dyn DriveApi>, executor: Arc<CallExecutor<DrivePolicy>>) -> Self {
        Self {
            api,
            executor,
            page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub async fn fetch_page(
        &self,
        scope: &FolderScope,
        token: Option<&str>,
    ) -> Result<Page, FetchError> {
        let query = listing_query(scope);
        let token = token.filter(|t| !t.is_empty());
        let list = self
            .executor
            .execute(|| self.api.list_files(&query, self.page_size, token))
            .await
            .map_err(|source| FetchError {
                scope: scope.clone(),
                source,
            })?;
        Ok(Page {
            items: list.files.into_iter().map(RemoteItem::from).collect(),
            next_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

pub fn listing_query(scope: &FolderScope) -> String {
    let filter = format!("mimeType = '{FOLDER_MIME_TYPE}' or trashed = true");
    if scope.is_root() {
        filter
    } else {
        format!("'{}' in parents and ({filter})", escape_literal(scope.id()))
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
