use std::error::Error;
use std::fmt;

use keyring::Entry;
use tracing::debug;

use crate::core::storage::{LocalStorage, StorageError};

pub const KEYRING_SERVICE: &str = "multichat";

/// Describes failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was
/// temporarily unavailable (for example when the keychain service is
/// locked or inaccessible). Permanent errors surface the underlying
/// cause directly so callers can report them to the user.
#[derive(Debug)]
pub enum KeyringAccessError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    fn inner(&self) -> &keyring::Error {
        match self {
            KeyringAccessError::Recoverable(err) | KeyringAccessError::Permanent(err) => err,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

impl fmt::Display for KeyringAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner())
    }
}

impl Error for KeyringAccessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.inner())
    }
}

/// Stores items as keyring passwords, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringStorage {
    service: String,
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|err| StorageError::Keyring(err.into()))
    }
}

impl LocalStorage for KeyringStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(StorageError::Keyring(err.into())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        debug!(service = %self.service, key, "storing keyring entry");
        self.entry(key)?
            .set_password(value)
            .map_err(|err| StorageError::Keyring(err.into()))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(StorageError::Keyring(err.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_failures_are_recoverable() {
        let err: KeyringAccessError =
            keyring::Error::PlatformFailure(Box::new(std::io::Error::other("locked"))).into();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("locked"));
        assert!(err.source().is_some());
    }

    #[test]
    fn other_failures_are_permanent() {
        let err: KeyringAccessError = keyring::Error::TooLong("user".into(), 255).into();
        assert!(!err.is_recoverable());

        let err: KeyringAccessError = keyring::Error::NoEntry.into();
        assert!(!err.is_recoverable());
    }
}
