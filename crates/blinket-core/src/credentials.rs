//! Bearer token storage.
//!
//! The store is the single source of truth for "is a session active". The
//! file-backed store keeps tokens in `<base>/credentials.json` with
//! restricted permissions (0600). Tokens are never logged in full.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Default key the token is stored under.
pub const DEFAULT_TOKEN_KEY: &str = "authToken";

/// A persisted bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    pub issued_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
        }
    }
}

/// Persistence for the single active credential.
///
/// Implementations must be safe to read from concurrent requests, and a
/// `clear` racing a `save` must leave either the whole new token or nothing.
pub trait CredentialStore: Send + Sync {
    /// Persists `credential`, replacing any previous one.
    ///
    /// # Errors
    /// `StorageFailure` when the medium is unavailable.
    fn save(&self, credential: &Credential) -> SyncResult<()>;

    /// Returns the stored credential, or `None` when logged out.
    ///
    /// # Errors
    /// `StorageFailure` only for an unreadable or corrupt medium.
    fn load(&self) -> SyncResult<Option<Credential>>;

    /// Deletes the credential. Clearing an empty store is not an error.
    ///
    /// # Errors
    /// `StorageFailure` when the medium is unavailable.
    fn clear(&self) -> SyncResult<()>;

    /// Deletes the credential only if it still holds `token`. Returns whether
    /// anything was removed.
    ///
    /// The default reads and clears in two steps; stores with a lock override
    /// it to compare and clear atomically.
    ///
    /// # Errors
    /// `StorageFailure` when the medium is unavailable.
    fn clear_if(&self, token: &str) -> SyncResult<bool> {
        match self.load()? {
            Some(current) if current.token == token => self.clear().map(|()| true),
            _ => Ok(false),
        }
    }
}

/// Masks a token for display.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() > 12 {
        let prefix: String = token.chars().take(12).collect();
        format!("{prefix}...")
    } else {
        "***".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process store. Tokens do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, credential: &Credential) -> SyncResult<()> {
        *lock(&self.slot) = Some(credential.clone());
        Ok(())
    }

    fn load(&self) -> SyncResult<Option<Credential>> {
        Ok(lock(&self.slot).clone())
    }

    fn clear(&self) -> SyncResult<()> {
        *lock(&self.slot) = None;
        Ok(())
    }

    fn clear_if(&self, token: &str) -> SyncResult<bool> {
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|current| current.token == token) {
            *slot = None;
            return Ok(true);
        }
        Ok(false)
    }
}

/// On-disk layout: key -> credential. Other keys are preserved on write.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(flatten)]
    entries: HashMap<String, Credential>,
}

/// File-backed store.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// concurrent reader sees either the old or the new file, never a partial one.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    key: String,
    io: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            io: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> SyncResult<CredentialFile> {
        if !self.path.exists() {
            return Ok(CredentialFile::default());
        }

        let contents = fs::read_to_string(&self.path).map_err(|err| {
            SyncError::storage(format!(
                "Failed to read credentials from {}: {err}",
                self.path.display()
            ))
        })?;

        if contents.trim().is_empty() {
            return Ok(CredentialFile::default());
        }

        serde_json::from_str(&contents).map_err(|err| {
            SyncError::storage(format!(
                "Failed to parse credentials from {}: {err}",
                self.path.display()
            ))
        })
    }

    fn write_file(&self, file: &CredentialFile) -> SyncResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| {
                SyncError::storage(format!(
                    "Failed to create directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let contents = serde_json::to_string_pretty(file)
            .map_err(|err| SyncError::storage(format!("Failed to serialize credentials: {err}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        write_restricted(&tmp_path, contents.as_bytes()).map_err(|err| {
            SyncError::storage(format!("Failed to write {}: {err}", tmp_path.display()))
        })?;

        fs::rename(&tmp_path, &self.path).map_err(|err| {
            SyncError::storage(format!(
                "Failed to replace {}: {err}",
                self.path.display()
            ))
        })
    }
}

#[cfg(unix)]
fn write_restricted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_restricted(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, credential: &Credential) -> SyncResult<()> {
        let _guard = lock(&self.io);
        let mut file = self.read_file()?;
        file.entries.insert(self.key.clone(), credential.clone());
        self.write_file(&file)?;
        tracing::debug!(token = %mask_token(&credential.token), "credential saved");
        Ok(())
    }

    fn load(&self) -> SyncResult<Option<Credential>> {
        let _guard = lock(&self.io);
        Ok(self.read_file()?.entries.remove(&self.key))
    }

    fn clear(&self) -> SyncResult<()> {
        let _guard = lock(&self.io);
        let mut file = self.read_file()?;
        if file.entries.remove(&self.key).is_none() {
            return Ok(());
        }
        self.write_file(&file)?;
        tracing::debug!("credential cleared");
        Ok(())
    }

    fn clear_if(&self, token: &str) -> SyncResult<bool> {
        let _guard = lock(&self.io);
        let mut file = self.read_file()?;
        if !file
            .entries
            .get(&self.key)
            .is_some_and(|current| current.token == token)
        {
            return Ok(false);
        }
        file.entries.remove(&self.key);
        self.write_file(&file)?;
        tracing::debug!(token = %mask_token(token), "credential cleared");
        Ok(true)
    }
}

/// In-memory copy in front of a durable store.
///
/// A token whose durable save failed still serves the running process; the
/// save error is returned so the caller can warn that it won't survive a
/// restart.
#[derive(Debug)]
pub struct CachedCredentialStore<S> {
    durable: S,
    /// `None` until first loaded; `Some(None)` means known-empty.
    cache: Mutex<Option<Option<Credential>>>,
}

impl<S: CredentialStore> CachedCredentialStore<S> {
    pub fn new(durable: S) -> Self {
        Self {
            durable,
            cache: Mutex::new(None),
        }
    }

    pub fn durable(&self) -> &S {
        &self.durable
    }
}

impl<S: CredentialStore> CredentialStore for CachedCredentialStore<S> {
    fn save(&self, credential: &Credential) -> SyncResult<()> {
        let mut cache = lock(&self.cache);
        *cache = Some(Some(credential.clone()));
        self.durable.save(credential)
    }

    fn load(&self) -> SyncResult<Option<Credential>> {
        let mut cache = lock(&self.cache);
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.clone());
        }
        let loaded = self.durable.load()?;
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    fn clear(&self) -> SyncResult<()> {
        let mut cache = lock(&self.cache);
        *cache = Some(None);
        self.durable.clear()
    }

    fn clear_if(&self, token: &str) -> SyncResult<bool> {
        let mut cache = lock(&self.cache);
        let current = match cache.as_ref() {
            Some(cached) => cached.clone(),
            None => self.durable.load()?,
        };
        if !current.as_ref().is_some_and(|current| current.token == token) {
            *cache = Some(current);
            return Ok(false);
        }
        *cache = Some(None);
        // The durable copy may already differ if its last save failed.
        self.durable.clear_if(token).map(|_| true)
    }
}
