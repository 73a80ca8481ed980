//! Client-local key/value storage.
//!
//! Mirrors browser `localStorage`: string values under fixed keys, with
//! absence being a normal state rather than an error.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::core::config::io::write_atomically;
use crate::core::keyring::KeyringAccessError;

pub const CHAT_MESSAGES_KEY: &str = "chatMessages";
pub const API_KEY_KEY: &str = "apiKey";
pub const SELECTED_MODEL_KEY: &str = "selectedModel";
/// Where an unreadable `chatMessages` value is kept instead of being overwritten.
pub const CORRUPT_CHAT_MESSAGES_KEY: &str = "chatMessages.corrupt";

#[derive(Debug)]
pub enum StorageError {
    Io { key: String, source: io::Error },
    Serialize(serde_json::Error),
    Keyring(KeyringAccessError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io { key, source } => {
                write!(f, "Failed to access stored '{key}': {source}")
            }
            StorageError::Serialize(err) => write!(f, "Failed to serialize chat history: {err}"),
            StorageError::Keyring(err) => write!(f, "Keyring error: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            StorageError::Serialize(err) => Some(err),
            StorageError::Keyring(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialize(err)
    }
}

impl From<KeyringAccessError> for StorageError {
    fn from(err: KeyringAccessError) -> Self {
        StorageError::Keyring(err)
    }
}

pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Removing a key that is not present succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!(key, bytes = value.len(), "writing stored item");
        write_atomically(&self.path_for(key), value.as_bytes()).map_err(|source| {
            StorageError::Io {
                key: key.to_string(),
                source,
            }
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

/// In-process storage; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items().remove(key);
        Ok(())
    }
}
