use anyhow::Context;
use async_trait::async_trait;
use drive_core::{ApiErrorClass, DriveClient, DriveError, FileList};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::RestoreConfig;
use crate::credentials::ClientSecret;
use crate::oauth_flow::OAuthFlow;
use crate::restore::DriveApi;
use crate::session::{Session, SessionError};
use crate::storage::{OAuthState, StorageError, TokenStorage};

/// Resolves credentials and returns a verified, self-renewing client.
/// Every failure here is fatal and happens before any traversal starts.
pub async fn connect(config: &RestoreConfig) -> anyhow::Result<AuthorizedDrive> {
    if let Some(token) = &config.access_token {
        let client = DriveClient::new(token.clone()).context("invalid drive client config")?;
        let about = client
            .get_about()
            .await
            .context("access token from DRIVE_UNTRASH_TOKEN was rejected")?;
        log_account(&about);
        return Ok(AuthorizedDrive::fixed(client));
    }

    let secret = ClientSecret::load(&config.client_secret_path).with_context(|| {
        format!(
            "unable to load client secret from {}",
            config.client_secret_path.display()
        )
    })?;
    let oauth = secret.oauth_client().context("invalid oauth client config")?;
    let cache = config
        .token_storage()
        .context("failed to resolve token cache location")?;
    let state = match cache.get_oauth_state() {
        Ok(state) => state,
        Err(StorageError::TokenNotFound) => authenticate_and_store(&secret, &cache).await?,
        Err(StorageError::Json(err)) => {
            warn!(path = %cache.path().display(), error = %err, "ignoring malformed token cache");
            authenticate_and_store(&secret, &cache).await?
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("unable to read token cache {}", cache.path().display())
            });
        }
    };

    let mut session = Session::new(state, Some(oauth.clone()), Some(cache.clone()));
    let client = match verify(&mut session).await {
        Ok(client) => client,
        Err(err) if is_revoked(&err) => {
            warn!("cached authorization was revoked, asking for consent again");
            let state = authenticate_and_store(&secret, &cache).await?;
            session = Session::new(state, Some(oauth), Some(cache));
            verify(&mut session)
                .await
                .context("unable to access drive after authorization")?
        }
        Err(err) => return Err(err.context("unable to access drive with the cached token")),
    };
    Ok(AuthorizedDrive::new(client, session))
}

async fn authenticate_and_store(
    secret: &ClientSecret,
    cache: &TokenStorage,
) -> anyhow::Result<OAuthState> {
    let client = secret.oauth_client().context("invalid oauth client config")?;
    let flow = OAuthFlow::new(client, secret.redirect_uri());
    let token = flow
        .authenticate()
        .await
        .context("unable to retrieve token from web")?;
    let state = OAuthState::from_oauth_token(&token);
    cache
        .save_oauth_state(&state)
        .context("failed to save token")?;
    info!(path = %cache.path().display(), "saved credential file");
    Ok(state)
}

/// `about.get` with the session's token, renewing once on 401.
async fn verify(session: &mut Session) -> anyhow::Result<DriveClient> {
    let client = DriveClient::new(session.fresh_token().await?)?;
    let (client, about) = match client.get_about().await {
        Ok(about) => (client, about),
        Err(err) if is_auth_error(&err) => {
            let client = client.with_token(session.renew().await?);
            let about = client.get_about().await?;
            (client, about)
        }
        Err(err) => return Err(err.into()),
    };
    log_account(&about);
    Ok(client)
}

fn is_revoked(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Revoked))
}

fn is_auth_error(err: &DriveError) -> bool {
    matches!(err.classification(), Some(ApiErrorClass::Auth))
}

fn log_account(about: &drive_core::About) {
    if let Some(email) = about.user.as_ref().and_then(|u| u.email_address.as_deref()) {
        info!(account = email, "authorized");
    }
}

struct AuthState {
    client: DriveClient,
    session: Option<Session>,
}

/// `DriveApi` that keeps the access token fresh for the length of a run.
/// A 401 triggers one renewal and one replay of the call. Once the grant is
/// revoked, renewal stops and calls fail with the API's auth error.
pub struct AuthorizedDrive {
    state: Mutex<AuthState>,
}

impl AuthorizedDrive {
    pub fn new(client: DriveClient, session: Session) -> Self {
        Self {
            state: Mutex::new(AuthState {
                client,
                session: Some(session),
            }),
        }
    }

    /// Raw access token, never renewed.
    pub fn fixed(client: DriveClient) -> Self {
        Self {
            state: Mutex::new(AuthState {
                client,
                session: None,
            }),
        }
    }

    async fn client(&self) -> DriveClient {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        if state.session.as_ref().is_some_and(Session::expires_soon) {
            renew_locked(state).await;
        }
        state.client.clone()
    }

    /// Renews unless another task already swapped the token away from
    /// `stale`.
    async fn client_after_auth_error(&self, stale: &str) -> Option<DriveClient> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.session.as_ref()?;
        if state.client.token() == stale && !renew_locked(state).await {
            return None;
        }
        Some(state.client.clone())
    }
}

async fn renew_locked(state: &mut AuthState) -> bool {
    let Some(session) = state.session.as_mut() else {
        return false;
    };
    match session.renew().await {
        Ok(token) => {
            state.client = state.client.with_token(token);
            true
        }
        Err(SessionError::Revoked) => {
            error!("authorization was revoked during the run, token renewal disabled");
            state.session = None;
            false
        }
        Err(err) => {
            warn!(error = %err, "token renewal failed, keeping current token");
            false
        }
    }
}

#[async_trait]
impl DriveApi for AuthorizedDrive {
    async fn list_files(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let client = self.client().await;
        match DriveApi::list_files(&client, query, page_size, page_token).await {
            Err(err) if is_auth_error(&err) => {
                match self.client_after_auth_error(client.token()).await {
                    Some(client) => {
                        DriveApi::list_files(&client, query, page_size, page_token).await
                    }
                    None => Err(err),
                }
            }
            result => result,
        }
    }

    async fn untrash(&self, file_id: &str) -> Result<(), DriveError> {
        let client = self.client().await;
        match client.untrash(file_id).await {
            Err(err) if is_auth_error(&err) => {
                match self.client_after_auth_error(client.token()).await {
                    Some(client) => client.untrash(file_id).await,
                    None => Err(err),
                }
            }
            result => result,
        }
    }
}
