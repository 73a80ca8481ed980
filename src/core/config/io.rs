use crate::core::config::data::{path_display, Config};
use directories::ProjectDirs;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Errors that can occur when loading or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Failed to serialize or write the configuration file.
    Write {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The platform offers no home or config directory.
    NoProjectDirs,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => write!(
                f,
                "Failed to read config at {}: {}",
                path_display(path),
                source
            ),
            ConfigError::Parse { path, source } => write!(
                f,
                "Failed to parse config at {}: {}",
                path_display(path),
                source
            ),
            ConfigError::Write { path, source } => write!(
                f,
                "Failed to write config at {}: {}",
                path_display(path),
                source
            ),
            ConfigError::NoProjectDirs => write!(f, "Failed to determine config directory"),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Write { source, .. } => Some(source.as_ref()),
            ConfigError::NoProjectDirs => None,
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("org", "multichat", "multichat").ok_or(ConfigError::NoProjectDirs)
}

impl Config {
    /// Load the user's configuration, or defaults when none exists yet.
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from_path(&Self::get_config_path()?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), ConfigError> {
        let write_error = |source: Box<dyn StdError + Send + Sync>| ConfigError::Write {
            path: config_path.to_path_buf(),
            source,
        };

        let contents = toml::to_string_pretty(self).map_err(|err| write_error(Box::new(err)))?;
        write_atomically(config_path, contents.as_bytes()).map_err(|err| write_error(Box::new(err)))
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding the transcript and selections, honouring `data_dir`.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }
}

/// Replace `path` with `contents` via a sibling temp file, creating parents.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());

    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };

    temp_file.write_all(contents)?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
