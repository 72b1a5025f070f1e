use std::path::{Path, PathBuf};

use drive_core::{OAuthClient, OUT_OF_BAND_REDIRECT};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("unable to read client secret file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to parse client secret file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("client secret file has neither an \"installed\" nor a \"web\" section")]
    MissingClient,
    #[error("invalid oauth endpoints: {0}")]
    OAuth(#[from] drive_core::OAuthError),
}

/// OAuth client registration as downloaded from the cloud console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn load(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read(path).map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, CredentialsError> {
        let file: ClientSecretFile = serde_json::from_slice(raw)?;
        file.installed
            .or(file.web)
            .ok_or(CredentialsError::MissingClient)
    }

    pub fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OUT_OF_BAND_REDIRECT)
    }

    pub fn oauth_client(&self) -> Result<OAuthClient, CredentialsError> {
        let client = match (&self.auth_uri, &self.token_uri) {
            (Some(auth_uri), Some(token_uri)) => OAuthClient::with_endpoints(
                auth_uri,
                token_uri,
                &self.client_id,
                &self.client_secret,
            )?,
            _ => OAuthClient::new(&self.client_id, &self.client_secret)?,
        };
        Ok(client)
    }
}
