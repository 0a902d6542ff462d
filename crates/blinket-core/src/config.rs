//! Configuration management for Blinket.
//!
//! Loads configuration from ${BLINKET_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default backend for the hosted Blinket API.
pub const DEFAULT_BASE_URL: &str = "https://locketcouplebe-production.up.railway.app";

const BASE_URL_ENV: &str = "BLINKET_BASE_URL";

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Blinket client configuration

# Backend base URL (BLINKET_BASE_URL overrides this)
# base_url = "https://locketcouplebe-production.up.railway.app"

# Per-request timeout in seconds (0 disables)
request_timeout_secs = 30

[credentials]
# Well-known key the bearer token is stored under
key = "authToken"
# file = "/path/to/credentials.json"

[comments]
# "client": fetch every comment and filter by photo id locally
# "server": ask the backend for one photo's comments
filtering = "client"

[logging]
# Overridden by RUST_LOG
level = "info"
# Write a daily-rolling log under ${BLINKET_HOME}/logs
file = false
"#;

pub mod paths {
    //! Path resolution for Blinket configuration and data directories.
    //!
    //! BLINKET_HOME resolution order:
    //! 1. BLINKET_HOME environment variable (if set)
    //! 2. ~/.config/blinket (default)
    //! 3. ./.blinket when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the Blinket home directory.
    pub fn blinket_home() -> PathBuf {
        if let Ok(home) = std::env::var("BLINKET_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".blinket"),
            |h| h.join(".config").join("blinket"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        blinket_home().join("config.toml")
    }

    /// Returns the default credential file path.
    pub fn credentials_path() -> PathBuf {
        blinket_home().join("credentials.json")
    }

    /// Returns the directory for rolling log files.
    pub fn logs_dir() -> PathBuf {
        blinket_home().join("logs")
    }
}

/// How a comment thread is narrowed to a single photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommentFiltering {
    /// The backend returns every comment; filter by photo id locally.
    #[default]
    Client,
    /// The backend accepts a `photoId` query and returns only that thread.
    Server,
}

/// Credential storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Key the bearer token is stored under
    pub key: String,
    /// Optional override for the credential file location
    pub file: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key: "authToken".to_string(),
            file: None,
        }
    }
}

impl CredentialsConfig {
    pub fn effective_path(&self) -> PathBuf {
        match self.file.as_deref().map(str::trim) {
            Some(file) if !file.is_empty() => PathBuf::from(file),
            _ => paths::credentials_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentsConfig {
    pub filtering: CommentFiltering,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Enables the rolling file writer
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend base URL override
    pub base_url: Option<String>,

    /// Timeout for a single request in seconds (0 disables)
    pub request_timeout_secs: u32,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub comments: CommentsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            credentials: CredentialsConfig::default(),
            comments: CommentsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    const DEFAULT_REQUEST_TIMEOUT_SECS: u32 = 30;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        fs::write(path, DEFAULT_CONFIG_TEMPLATE)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is malformed.
    pub fn effective_base_url(&self) -> Result<String> {
        if let Ok(env_url) = std::env::var(BASE_URL_ENV) {
            let trimmed = env_url.trim();
            if !trimmed.is_empty() {
                return validate_url(trimmed);
            }
        }

        if let Some(config_url) = self.base_url.as_deref() {
            let trimmed = config_url.trim();
            if !trimmed.is_empty() {
                return validate_url(trimmed);
            }
        }

        Ok(DEFAULT_BASE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.request_timeout_secs)))
        }
    }
}

fn validate_url(url: &str) -> Result<String> {
    url::Url::parse(url).with_context(|| format!("Invalid Blinket base URL: {url}"))?;
    Ok(url.trim_end_matches('/').to_string())
}
