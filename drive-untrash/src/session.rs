use drive_core::OAuthClient;
use thiserror::Error;
use tracing::{debug, warn};

use crate::storage::{OAuthState, TokenStorage, now_unix};

/// Google access tokens live for an hour; refresh a minute before that.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("access token expired and no refresh token was issued")]
    NoRefreshToken,
    #[error("access token expired and no oauth client is configured")]
    NoOAuthClient,
    #[error("refresh token was revoked or has expired, authorize again")]
    Revoked,
    #[error("token refresh failed: {0}")]
    Refresh(#[source] drive_core::OAuthError),
}

/// Authorization of one account: the current grant, the means to renew it,
/// and the cache it is written back to.
pub struct Session {
    state: OAuthState,
    oauth: Option<OAuthClient>,
    cache: Option<TokenStorage>,
}

impl Session {
    pub fn new(state: OAuthState, oauth: Option<OAuthClient>, cache: Option<TokenStorage>) -> Self {
        Self {
            state,
            oauth,
            cache,
        }
    }

    /// Tokens without a recorded expiry are treated as valid until the API
    /// rejects them.
    pub fn expires_soon(&self) -> bool {
        self.state
            .expires_at
            .is_some_and(|at| at <= now_unix().saturating_add(EXPIRY_MARGIN_SECS))
    }

    /// Current token, renewed first when it is about to expire.
    pub async fn fresh_token(&mut self) -> Result<String, SessionError> {
        if self.expires_soon() {
            self.renew().await?;
        }
        Ok(self.state.access_token.clone())
    }

    /// Exchanges the refresh token for a new access token and writes the
    /// result to the cache. A revoked grant wipes the cache.
    pub async fn renew(&mut self) -> Result<String, SessionError> {
        let refresh_token = self
            .state
            .refresh_token
            .clone()
            .ok_or(SessionError::NoRefreshToken)?;
        let oauth = self.oauth.as_ref().ok_or(SessionError::NoOAuthClient)?;
        let token = match oauth.refresh_token(&refresh_token).await {
            Ok(token) => token,
            Err(err) if err.is_invalid_grant() => {
                self.forget();
                return Err(SessionError::Revoked);
            }
            Err(err) => return Err(SessionError::Refresh(err)),
        };

        // Google only returns a refresh token on the first exchange.
        let mut renewed = OAuthState::from_oauth_token(&token);
        renewed.refresh_token.get_or_insert(refresh_token);
        if renewed.scope.is_none() {
            renewed.scope = self.state.scope.take();
        }
        self.state = renewed;
        debug!(expires_at = ?self.state.expires_at, "access token renewed");
        self.persist();
        Ok(self.state.access_token.clone())
    }

    fn persist(&self) {
        if let Some(cache) = &self.cache
            && let Err(err) = cache.save_oauth_state(&self.state)
        {
            warn!(path = %cache.path().display(), error = %err, "failed to persist token");
        }
    }

    fn forget(&self) {
        if let Some(cache) = &self.cache
            && let Err(err) = cache.delete_token()
        {
            warn!(path = %cache.path().display(), error = %err, "failed to clear revoked token");
        }
    }
}
