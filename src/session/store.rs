//! Local session storage.
//!
//! The dashboard caches the signed-in user under a single key. The
//! session-expiry interceptor only ever needs to remove that key.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

/// Errors from a session store.
#[derive(Error, Debug)]
pub enum SessionStoreError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The store file is not a JSON object of strings.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The in-memory lock was poisoned by a panicking writer.
    #[error("session store lock poisoned")]
    Poisoned,
}

/// Result type for session store operations.
pub type SessionStoreResult<T> = Result<T, SessionStoreError>;

/// A key-value store for cached session data.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> SessionStoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> SessionStoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> SessionStoreResult<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> SessionStoreResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|_| SessionStoreError::Poisoned)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> SessionStoreResult<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SessionStoreResult<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SessionStoreResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk.
///
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Opens a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> SessionStoreResult<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(SessionStoreError::Io(e)),
        }
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> SessionStoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> SessionStoreResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>) -> bool,
    {
        let _lock = self.lock.lock().map_err(|_| SessionStoreError::Poisoned)?;
        let mut entries = self.read_all()?;
        if f(&mut entries) {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> SessionStoreResult<Option<String>> {
        let _lock = self.lock.lock().map_err(|_| SessionStoreError::Poisoned)?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> SessionStoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> SessionStoreResult<()> {
        self.update(|entries| entries.remove(key).is_some())
    }
}
