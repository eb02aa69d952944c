//! Persistence for template execution records.
//!
//! Records are opaque byte blobs keyed by the execution identity. Keys are
//! time-sortable, so listing them in key order lists executions
//! chronologically. This module defines the store contract along with an
//! in-memory store for tests and a directory-backed store that writes one
//! file per record.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dirs_next::{config_dir, home_dir};
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable controlling the log directory location.
pub const LOG_DIR_ENV: &str = "RUNBOOK_LOG_DIR";

/// Extension of record files inside the log directory.
pub const RECORD_FILE_EXTENSION: &str = "json";

/// Errors surfaced by log store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Nothing is stored under the key.
    #[error("no record stored under key '{0}'")]
    NotFound(String),
    /// The key cannot be used by this store.
    #[error("invalid record key '{0}'")]
    InvalidKey(String),
    /// I/O failure while reading or writing records.
    #[error("log store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key/value contract consumed by the template engine.
///
/// Every call is a complete request: implementations must not keep locks held
/// once a call returns.
pub trait TemplateStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove the record stored under `key`.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every record, returning how many were deleted.
    fn delete_all(&self) -> Result<usize, StoreError>;

    /// Every `(key, bytes)` pair in ascending key order.
    fn list_all(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// In-memory store primarily used for unit testing.
#[derive(Default)]
pub struct InMemoryTemplateStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryTemplateStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for InMemoryTemplateStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("log store lock poisoned");
        records.insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let records = self.records.lock().expect("log store lock poisoned");
        records.get(key).cloned().ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("log store lock poisoned");
        records
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let mut records = self.records.lock().expect("log store lock poisoned");
        let count = records.len();
        records.clear();
        Ok(count)
    }

    fn list_all(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let records = self.records.lock().expect("log store lock poisoned");
        Ok(records.iter().map(|(key, bytes)| (key.clone(), bytes.clone())).collect())
    }
}

/// Store persisting each record as `<key>.json` inside a directory.
pub struct DirectoryTemplateStore {
    root: PathBuf,
}

impl DirectoryTemplateStore {
    /// Create a store rooted at the provided path (or the default path when omitted).
    ///
    /// The directory is created lazily on first write.
    pub fn new<P: Into<Option<PathBuf>>>(path: P) -> Self {
        let root = match path.into() {
            Some(path) => expand_tilde_path(path),
            None => default_log_dir(),
        };
        Self { root }
    }

    /// Initialize a store using the default location.
    pub fn with_defaults() -> Self {
        Self::new(None::<PathBuf>)
    }

    /// Access the directory holding the records.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_key(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.{RECORD_FILE_EXTENSION}")))
    }

    fn record_keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StoreError::Io(error)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|extension| extension.to_str()) != Some(RECORD_FILE_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) if is_valid_key(stem) => keys.push(stem.to_string()),
                _ => warn!("Ignoring unexpected file in log directory: {}", path.display()),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

impl TemplateStore for DirectoryTemplateStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.root)?;
        fs::write(&path, bytes)?;
        debug!(key = %key, path = %path.display(), "stored template record");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.record_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(error) => Err(StoreError::Io(error)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(error) => Err(StoreError::Io(error)),
        }
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let keys = self.record_keys()?;
        for key in &keys {
            fs::remove_file(self.record_path(key)?)?;
        }
        Ok(keys.len())
    }

    fn list_all(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut records = Vec::new();
        for key in self.record_keys()? {
            let bytes = fs::read(self.record_path(&key)?)?;
            records.push((key, bytes));
        }
        Ok(records)
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_')
}

fn expand_tilde_path(path: PathBuf) -> PathBuf {
    if let Some(first) = path.components().next()
        && first.as_os_str() != "~"
    {
        return path;
    }

    let input = path.to_string_lossy();
    let trimmed = input.trim();

    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }

    PathBuf::from(trimmed)
}

fn default_log_dir() -> PathBuf {
    if let Ok(path) = env::var(LOG_DIR_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde_path(PathBuf::from(path));
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("runbook").join("logs")
}
