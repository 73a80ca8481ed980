use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::attachment::DEFAULT_MAX_ATTACHMENT_BYTES;
use crate::core::dispatch::DEFAULT_REQUEST_TIMEOUT;
use crate::core::providers::anthropic::DEFAULT_API_VERSION;
use crate::core::providers::DEFAULT_MAX_TOKENS;

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Where the secret key is kept between runs.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SecretStorage {
    /// Alongside the transcript in the data directory.
    #[default]
    File,
    /// In the platform keyring.
    Keyring,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Model used when nothing (valid) has been selected yet
    pub default_model: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_attachment_bytes: Option<u64>,
    /// Sent as `max_tokens` to providers that require it
    pub max_tokens: Option<u32>,
    /// Value of the `anthropic-version` header
    pub anthropic_version: Option<String>,
    pub secret_storage: Option<SecretStorage>,
    /// Overrides the platform data directory for the transcript and selections
    pub data_dir: Option<PathBuf>,
    /// Base URL overrides keyed by provider id (e.g., "openai")
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

impl Config {
    pub fn default_model(&self) -> &str {
        self.default_model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_bytes
            .unwrap_or(DEFAULT_MAX_ATTACHMENT_BYTES)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn anthropic_version(&self) -> &str {
        self.anthropic_version
            .as_deref()
            .unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn secret_storage(&self) -> SecretStorage {
        self.secret_storage.unwrap_or_default()
    }

    /// Configured base URL for a provider id, matched case-insensitively.
    pub fn base_url_for(&self, provider: &str) -> Option<&str> {
        self.base_urls
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(provider))
            .map(|(_, url)| url.as_str())
            .filter(|url| !url.trim().is_empty())
    }
}
