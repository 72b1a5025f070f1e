use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Full read/write access, required to untrash items.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Redirect target for the copy/paste flow of installed applications.
pub const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

impl OAuthError {
    /// Google's `error` code from a token endpoint failure, e.g. `invalid_grant`.
    pub fn error_code(&self) -> Option<String> {
        match self {
            OAuthError::Api { body, .. } => serde_json::from_str::<TokenErrorBody>(body)
                .ok()
                .map(|parsed| parsed.error)
                .filter(|code| !code.is_empty()),
            _ => None,
        }
    }

    /// The refresh token was revoked or expired; only a new consent helps.
    pub fn is_invalid_grant(&self) -> bool {
        self.error_code().as_deref() == Some("invalid_grant")
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: String,
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    auth_uri: Url,
    token_uri: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Self::with_endpoints(DEFAULT_AUTH_URI, DEFAULT_TOKEN_URI, client_id, client_secret)
    }

    pub fn with_endpoints(
        auth_uri: &str,
        token_uri: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, OAuthError> {
        Ok(Self {
            http: Client::new(),
            auth_uri: Url::parse(auth_uri)?,
            token_uri: Url::parse(token_uri)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Consent page URL. Always asks for offline access so the token
    /// response carries a refresh token.
    pub fn authorize_url(&self, redirect_uri: &str, scope: &str, state: Option<&str>) -> Url {
        let mut url = self.auth_uri.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", redirect_uri);
            query.append_pair("scope", scope);
            query.append_pair("access_type", "offline");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, OAuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        self.post_token_form(&form).await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> Result<OAuthToken, OAuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        self.post_token_form(&form).await
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<OAuthToken, OAuthError> {
        let response = self
            .http
            .post(self.token_uri.clone())
            .form(form)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json::<OAuthToken>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(OAuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: StatusCode, body: &str) -> OAuthError {
        OAuthError::Api {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn other_token_errors_are_not_invalid_grant() {
        let err = api_error(StatusCode::UNAUTHORIZED, r#"{"error":"invalid_client"}"#);
        assert_eq!(err.error_code().as_deref(), Some("invalid_client"));
        assert!(!err.is_invalid_grant());

        let err = api_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.error_code(), None);
        assert!(!err.is_invalid_grant());
    }
}
