use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::OAuthState;

const APP_DIR: &str = "drive-untrash";
const TOKEN_FILE: &str = "token.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("token not found")]
    TokenNotFound,
    #[error("config directory is unavailable")]
    NoConfigDir,
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("token cache is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON file cache for the OAuth state.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf, StorageError> {
        let base = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(base.join(APP_DIR).join(TOKEN_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_oauth_state(&self) -> Result<OAuthState, StorageError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::TokenNotFound);
            }
            Err(err) => return Err(self.io_error(err)),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save_oauth_state(&self, state: &OAuthState) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let payload = serde_json::to_vec_pretty(state)?;
        let mut file = open_private(&self.path).map_err(|err| self.io_error(err))?;
        file.write_all(&payload)
            .and_then(|_| file.flush())
            .map_err(|err| self.io_error(err))
    }

    pub fn delete_token(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
