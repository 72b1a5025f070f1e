use async_trait::async_trait;
use drive_core::{DriveClient, DriveError, FileList};

/// Fields requested from `files.list`; everything else is left out of the
/// response.
pub const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, explicitlyTrashed)";

/// The two remote calls a restore run needs.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError>;

    async fn untrash(&self, file_id: &str) -> Result<(), DriveError>;
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        DriveClient::list_files(self, query, page_size, page_token, Some(LIST_FIELDS)).await
    }

    async fn untrash(&self, file_id: &str) -> Result<(), DriveError> {
        self.untrash_file(file_id).await.map(|_| ())
    }
}
