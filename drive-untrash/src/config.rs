use std::path::PathBuf;
use std::sync::Arc;

use crate::restore::backoff::DriveCurve;
use crate::restore::executor::{AGGRESSIVE_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONNECTIONS};
use crate::restore::{DrivePolicy, RestoreOptions};
use crate::storage::{StorageError, TokenStorage};

const DEFAULT_CLIENT_SECRET: &str = "client_secret.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreConfig {
    pub max_connections: usize,
    pub max_attempts: u32,
    pub aggressive: bool,
    pub page_size: u32,
    pub dry_run: bool,
    pub client_secret_path: PathBuf,
    pub token_cache_path: Option<PathBuf>,
    pub access_token: Option<String>,
}

/// Command-line values that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub max_connections: Option<usize>,
    pub retries: Option<u32>,
    pub aggressive: bool,
    pub dry_run: bool,
}

impl RestoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            max_connections: read_u64(&lookup, "DRIVE_UNTRASH_MAX_CONNECTIONS")
                .map(|v| usize::try_from(v).unwrap_or(usize::MAX))
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            max_attempts: read_u64(&lookup, "DRIVE_UNTRASH_RETRIES")
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            aggressive: read_bool(&lookup, "DRIVE_UNTRASH_AGGRESSIVE", false),
            page_size: read_u64(&lookup, "DRIVE_UNTRASH_PAGE_SIZE")
                .map(|v| v.clamp(1, drive_core::MAX_PAGE_SIZE as u64) as u32)
                .unwrap_or(drive_core::MAX_PAGE_SIZE),
            dry_run: read_bool(&lookup, "DRIVE_UNTRASH_DRY_RUN", false),
            client_secret_path: lookup("DRIVE_UNTRASH_CLIENT_SECRET")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLIENT_SECRET)),
            token_cache_path: lookup("DRIVE_UNTRASH_TOKEN_CACHE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            access_token: lookup("DRIVE_UNTRASH_TOKEN").filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn apply(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(max) = overrides.max_connections.filter(|v| *v > 0) {
            self.max_connections = max;
        }
        if let Some(retries) = overrides.retries.filter(|v| *v > 0) {
            self.max_attempts = retries;
        }
        self.aggressive |= overrides.aggressive;
        self.dry_run |= overrides.dry_run;
        self
    }

    /// Aggressive mode replaces the attempt budget, it does not add to it.
    pub fn effective_max_attempts(&self) -> u32 {
        if self.aggressive {
            AGGRESSIVE_MAX_ATTEMPTS
        } else {
            self.max_attempts
        }
    }

    pub fn token_storage(&self) -> Result<TokenStorage, StorageError> {
        match &self.token_cache_path {
            Some(path) => Ok(TokenStorage::new(path)),
            None => Ok(TokenStorage::new(TokenStorage::default_path()?)),
        }
    }

    pub fn restore_options(&self) -> RestoreOptions {
        RestoreOptions {
            max_connections: self.max_connections,
            policy: DrivePolicy::new(
                self.effective_max_attempts(),
                Arc::new(DriveCurve::default()),
            ),
            page_size: self.page_size,
            dry_run: self.dry_run,
        }
    }
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<u64> {
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
