//! Persisted token storage.
//!
//! # Design
//! - The token and its expiry are one value; they are written and cleared together.
//! - Stores are synchronous: every call completes within the calling operation,
//!   so a session update never interleaves with a half-written pair.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Token pair as persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    /// Bearer credential.
    pub access_token: String,
    /// Expiry in epoch milliseconds, when known at login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<i64>,
}

/// Key-value storage for the session token.
pub trait TokenStore: Send + Sync + fmt::Debug {
    /// Read the persisted token, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage is unreadable or corrupt.
    fn load(&self) -> Result<Option<PersistedToken>, StoreError>;

    /// Replace the persisted token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage cannot be written.
    fn save(&self, token: &PersistedToken) -> Result<(), StoreError>;

    /// Remove the persisted token. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when storage cannot be written.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store, used for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<PersistedToken>>,
}

impl MemoryTokenStore {
    /// Store pre-populated with `token`.
    #[must_use]
    pub fn with_token(token: PersistedToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<PersistedToken>, StoreError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &PersistedToken) -> Result<(), StoreError> {
        *self.slot.lock() = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.slot.lock().take();
        Ok(())
    }
}

/// JSON file store. Writes go through a sibling temp file and a rename.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by the file at `path`; the file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<PersistedToken>, StoreError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    operation: "token_store.read",
                    source,
                });
            }
        };
        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { source })
    }

    fn save(&self, token: &PersistedToken) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                operation: "token_store.create_dir",
                source,
            })?;
        }
        let bytes =
            serde_json::to_vec_pretty(token).map_err(|source| StoreError::Serialize { source })?;

        let temp = self.temp_path();
        write_private(&temp, &bytes).map_err(|source| StoreError::Io {
            operation: "token_store.write",
            source,
        })?;
        fs::rename(&temp, &self.path).map_err(|source| StoreError::Io {
            operation: "token_store.rename",
            source,
        })
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                operation: "token_store.remove",
                source,
            }),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
