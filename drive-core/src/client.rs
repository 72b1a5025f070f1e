use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Largest `pageSize` accepted by `files.list`.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api {
        status: StatusCode,
        reason: Option<String>,
        body: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Same connection pool and base url, different access token.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `about.get`, used to check that the access token is accepted.
    pub async fn get_about(&self) -> Result<About, DriveError> {
        let mut url = self.endpoint("/drive/v3/about")?;
        url.query_pairs_mut().append_pair("fields", "user");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// One `files.list` call. `query` is a Drive search expression.
    pub async fn list_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
        fields: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut url = self.endpoint("/drive/v3/files")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query);
            pairs.append_pair("pageSize", &page_size.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(fields) = fields.filter(|f| !f.is_empty()) {
                pairs.append_pair("fields", fields);
            }
            if let Some(token) = page_token.filter(|t| !t.is_empty()) {
                pairs.append_pair("pageToken", token);
            }
        }
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Clears the trashed flag of a file or folder. Untrashing an item that
    /// is not in the trash succeeds without changes.
    pub async fn untrash_file(&self, file_id: &str) -> Result<File, DriveError> {
        let mut url = self.endpoint("/drive/v3/files/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(file_id);
        url.query_pairs_mut()
            .append_pair("fields", "id,name,mimeType,trashed,explicitlyTrashed");
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.token)
            .json(&TrashedUpdate { trashed: false })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, DriveError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = first_error_reason(&body);
            Err(DriveError::Api {
                status,
                reason,
                body,
            })
        }
    }
}

impl DriveError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DriveError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DriveError::Api { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, reason, .. } => {
                Some(classify_api_error(*status, reason.as_deref()))
            }
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_error(status: StatusCode, reason: Option<&str>) -> ApiErrorClass {
    if status.is_server_error() {
        ApiErrorClass::Transient
    } else if matches!(reason, Some("rateLimitExceeded" | "userRateLimitExceeded")) {
        ApiErrorClass::RateLimit
    } else if status == StatusCode::UNAUTHORIZED {
        ApiErrorClass::Auth
    } else {
        ApiErrorClass::Permanent
    }
}

/// Drive classifies on the first entry of `error.errors` only.
fn first_error_reason(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    envelope
        .error
        .errors
        .into_iter()
        .next()
        .and_then(|detail| detail.reason)
        .filter(|reason| !reason.is_empty())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrashedUpdate {
    trashed: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct About {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub trashed: Option<bool>,
    #[serde(default)]
    pub explicitly_trashed: bool,
}

impl File {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub files: Vec<File>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            classify_api_error(StatusCode::SERVICE_UNAVAILABLE, None),
            ApiErrorClass::Transient
        );
        assert_eq!(
            classify_api_error(StatusCode::INTERNAL_SERVER_ERROR, Some("backendError")),
            ApiErrorClass::Transient
        );
    }

    #[test]
    fn rate_limit_reasons_are_retryable_regardless_of_status() {
        assert_eq!(
            classify_api_error(StatusCode::FORBIDDEN, Some("userRateLimitExceeded")),
            ApiErrorClass::RateLimit
        );
        assert_eq!(
            classify_api_error(StatusCode::TOO_MANY_REQUESTS, Some("rateLimitExceeded")),
            ApiErrorClass::RateLimit
        );
    }

    #[test]
    fn other_client_errors_are_permanent() {
        assert_eq!(
            classify_api_error(StatusCode::NOT_FOUND, Some("notFound")),
            ApiErrorClass::Permanent
        );
        assert_eq!(
            classify_api_error(StatusCode::FORBIDDEN, Some("insufficientPermissions")),
            ApiErrorClass::Permanent
        );
        assert_eq!(
            classify_api_error(StatusCode::UNAUTHORIZED, Some("authError")),
            ApiErrorClass::Auth
        );
    }

    #[test]
    fn extracts_first_reason_from_google_envelope() {
        let body = r#"{"error":{"code":403,"message":"limit","errors":[{"domain":"usageLimits","reason":"userRateLimitExceeded","message":"limit"}]}}"#;
        assert_eq!(
            first_error_reason(body).as_deref(),
            Some("userRateLimitExceeded")
        );
        assert_eq!(first_error_reason("not json"), None);
    }

    #[test]
    fn later_rate_limit_reason_does_not_make_error_retryable() {
        let body = r#"{"error":{"code":403,"errors":[{"reason":"insufficientFilePermissions"},{"reason":"userRateLimitExceeded"}]}}"#;
        assert_eq!(
            first_error_reason(body).as_deref(),
            Some("insufficientFilePermissions")
        );
        let err = DriveError::Api {
            status: StatusCode::FORBIDDEN,
            reason: first_error_reason(body),
            body: body.to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.classification(), Some(ApiErrorClass::Permanent));
    }
}
