//! # Configuration
//!
//! Application settings, resolved in three layers:
//!
//! 1. `rapport.toml` (or the file named by `--config`)
//! 2. Environment overrides: `RAPPORT_API_KEY`, `RAPPORT_RATE_LIMIT`,
//!    `RAPPORT_CORS_ORIGINS`, `RAPPORT_LOG_FORMAT`
//! 3. CLI flags, applied by [`crate::cli`]
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! database = "rapport.db"
//! backend = "redb"
//!
//! [security]
//! api_key = "change-me"
//! rate_limit = 100
//! cors_origins = "https://crm.example.com"
//!
//! [logging]
//! format = "json"
//! ```

use clap::ValueEnum;
use rapport_core::RapportError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rapport.toml";

/// Default requests per second for the global rate limiter.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// SECTIONS
// =============================================================================

/// Where the ledger lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database, one write transaction per command.
    #[default]
    Redb,
    /// Canonical export file, rewritten after every command.
    File,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Redb => "redb",
            Backend::File => "file",
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = RapportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(RapportError::InvalidEnum {
                field: "log_format",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: Backend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("rapport.db"),
            backend: Backend::Redb,
        }
    }
}

/// HTTP security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Bearer key required on every route except `/health`. `None` disables auth.
    pub api_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Comma-separated origins, or `*`. `None` allows localhost only.
    pub cors_origins: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Fully resolved application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load the config file, then apply environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `rapport.toml` is used
    /// if present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, RapportError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, RapportError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RapportError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, RapportError> {
        toml::from_str(text).map_err(|e| RapportError::SerializationError(format!("config: {}", e)))
    }

    /// Apply `RAPPORT_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), RapportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("RAPPORT_API_KEY") {
            self.security.api_key = Some(key);
        }
        if let Some(limit) = var("RAPPORT_RATE_LIMIT") {
            self.security.rate_limit = limit.trim().parse().map_err(|_| {
                RapportError::InvalidInput(format!("RAPPORT_RATE_LIMIT is not a number: {limit}"))
            })?;
        }
        if let Some(origins) = var("RAPPORT_CORS_ORIGINS") {
            self.security.cors_origins = Some(origins);
        }
        if let Some(format) = var("RAPPORT_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        Ok(())
    }

    /// The configured API key, treating an empty key as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.security
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}

// =============================================================================
// TESTS
// =============================================================================
