//! Runtime configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `UPRISK_MODEL_PATH` | `models/uprisk_logreg.json` |
//! | `UPRISK_ENCODING_MODE` | `lenient` |
//! | `UPRISK_LOG_MODE` | `auto` |
//! | `UPRISK_LOG_FILE` | `uprisk.log` |

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::EncodingMode;

pub const MODEL_PATH_ENV: &str = "UPRISK_MODEL_PATH";
pub const ENCODING_MODE_ENV: &str = "UPRISK_ENCODING_MODE";
pub const LOG_MODE_ENV: &str = "UPRISK_LOG_MODE";
pub const LOG_FILE_ENV: &str = "UPRISK_LOG_FILE";

pub const DEFAULT_MODEL_PATH: &str = "models/uprisk_logreg.json";
pub const DEFAULT_LOG_FILE: &str = "uprisk.log";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    InvalidValue { var: &'static str, message: String },
}

/// Where log output goes.
///
/// Writing logs to the terminal corrupts the TUI's alternate screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// File when stdout is a terminal, stdout otherwise.
    #[default]
    Auto,
    File,
    Stdout,
}

impl LogMode {
    /// Whether logs go to a file, given whether stdout is interactive.
    #[must_use]
    pub fn use_file(self, interactive: bool) -> bool {
        match self {
            Self::File => true,
            Self::Stdout => false,
            Self::Auto => interactive,
        }
    }
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "stdout" => Ok(Self::Stdout),
            other => Err(format!("unknown log mode '{other}' (expected auto, file or stdout)")),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub model_path: PathBuf,
    pub encoding_mode: EncodingMode,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            encoding_mode: EncodingMode::Lenient,
            log_mode: LogMode::Auto,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError` if an enumerated setting has an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `ConfigError` if an enumerated setting has an unknown value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(MODEL_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            config.model_path = PathBuf::from(path);
        }
        if let Some(mode) = lookup(ENCODING_MODE_ENV) {
            config.encoding_mode = parse_var(ENCODING_MODE_ENV, &mode)?;
        }
        if let Some(mode) = lookup(LOG_MODE_ENV) {
            config.log_mode = parse_var(LOG_MODE_ENV, &mode)?;
        }
        if let Some(file) = lookup(LOG_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.log_file = PathBuf::from(file);
        }

        Ok(config)
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    raw.parse()
        .map_err(|message| ConfigError::InvalidValue { var, message })
}
