//! Configuration management.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML config file,
//! environment variables (`FEEDGROUPS_DATA_DIR`, `FEEDGROUPS_LOG_FORMAT`),
//! then command-line flags applied by the caller.

use crate::io::DEFAULT_EXPORT_TITLE;
use crate::observability::{LogFormat, LoggingConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "FEEDGROUPS_DATA_DIR";

/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "FEEDGROUPS_LOG_FORMAT";

/// Main configuration for feedgroups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedGroupsConfig {
    /// Directory holding `groups.json` and `sources.json`.
    pub data_dir: PathBuf,
    /// Title written into exported documents.
    pub export_title: String,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Export document title.
    pub export_title: Option<String>,
    /// Logging section.
    pub logging: Option<LoggingConfig>,
}

impl Default for FeedGroupsConfig {
    fn default() -> Self {
        let data_dir = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".feedgroups"),
            |dirs| dirs.data_dir().join("feedgroups"),
        );
        Self {
            data_dir,
            export_title: DEFAULT_EXPORT_TITLE.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FeedGroupsConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Returns the default config file path
    /// (`<platform config dir>/feedgroups/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("feedgroups").join("config.toml"))
    }

    /// Loads configuration from the default location.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Loads configuration from `path` (or the default location), then
    /// applies `.env` and process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is unreadable or an override is
    /// invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::OperationFailed {
                    operation: "load_dotenv".to_string(),
                    cause: e.to_string(),
                });
            }
        }
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default()?,
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `FEEDGROUPS_LOG_FORMAT` is not a
    /// known format.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV).filter(|f| !f.is_empty()) {
            self.logging.format = format
                .parse::<LogFormat>()
                .map_err(|e| Error::InvalidInput(format!("{LOG_FORMAT_ENV}: {e}")))?;
        }
        Ok(self)
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();
        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(title) = file.export_title {
            config.export_title = title;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        config
    }
}
