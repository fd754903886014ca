//! Runtime configuration.
//!
//! # Responsibility
//! - Load `NoteKeyConfig` from a TOML file with per-field defaults.
//! - Apply environment overrides for the credential, model and log level.
//!
//! # Invariants
//! - A missing or placeholder API key is a valid, "unconfigured" state.
//! - Loading never panics; every failure is a `ConfigError`.

use crate::service::debounce::DebounceWindows;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_API_KEY: &str = "NOTEKEY_GEMINI_API_KEY";
pub const ENV_MODEL: &str = "NOTEKEY_GEMINI_MODEL";
pub const ENV_LOG_LEVEL: &str = "NOTEKEY_LOG_LEVEL";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1";
const DEFAULT_DB_FILE: &str = "notekey.sqlite3";
const PLACEHOLDER_API_KEY: &str = "YOUR_GEMINI_API_KEY_HERE";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteKeyConfig {
    pub gemini: GeminiConfig,
    pub debounce: DebounceConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

impl GeminiConfig {
    /// API key when set to something other than blank or the template
    /// placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Debounce windows in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub add_text_ms: u64,
    pub explain_text_ms: u64,
    pub create_note_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            add_text_ms: 1_500,
            explain_text_ms: 2_000,
            create_note_ms: 2_000,
        }
    }
}

impl DebounceConfig {
    pub fn windows(&self) -> DebounceWindows {
        DebounceWindows {
            add_text: Duration::from_millis(self.add_text_ms),
            explain_text: Duration::from_millis(self.explain_text_ms),
            create_note: Duration::from_millis(self.create_note_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl NoteKeyConfig {
    /// Loads a TOML file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Applies overrides read through `lookup` (injected for tests).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|value| !value.trim().is_empty()) {
            self.gemini.model = model.trim().to_string();
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|value| !value.trim().is_empty()) {
            self.logging.level = level.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini.model.trim().is_empty() {
            return Err(ConfigError::Invalid("gemini.model cannot be empty".to_string()));
        }
        if self.gemini.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "gemini.endpoint cannot be empty".to_string(),
            ));
        }
        if self.gemini.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "gemini.request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
