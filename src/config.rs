//! Configuration file support for metaforge
//!
//! Reads configuration from `~/.config/metaforge/config.json`:
//!
//! ```json
//! {
//!   "index_url": "https://pypi.org/pypi",
//!   "python_floor": "3.6",
//!   "python_newest": "3.14",
//!   "python_interpreter": "python3",
//!   "build_script_timeout_secs": 60
//! }
//! ```

use crate::registry::DEFAULT_INDEX_URL;
use crate::requirements::python_version::{PyMinor, PythonSupport};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PYTHON_FLOOR: &str = "3.6";
const DEFAULT_PYTHON_NEWEST: &str = "3.14";
const DEFAULT_PYTHON_INTERPRETER: &str = "python3";
const DEFAULT_BUILD_SCRIPT_TIMEOUT_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot determine config directory. HOME environment variable not set.")]
    NoConfigDir,

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// PyPI JSON API root
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Oldest Python 3 minor recipes are built for
    #[serde(default = "default_python_floor")]
    pub python_floor: String,

    /// Newest tracked Python 3 minor
    #[serde(default = "default_python_newest")]
    pub python_newest: String,

    /// Interpreter used to run build scripts
    #[serde(default = "default_python_interpreter")]
    pub python_interpreter: String,

    #[serde(default = "default_build_script_timeout")]
    pub build_script_timeout_secs: u64,
}

fn default_index_url() -> String {
    DEFAULT_INDEX_URL.to_string()
}

fn default_python_floor() -> String {
    DEFAULT_PYTHON_FLOOR.to_string()
}

fn default_python_newest() -> String {
    DEFAULT_PYTHON_NEWEST.to_string()
}

fn default_python_interpreter() -> String {
    DEFAULT_PYTHON_INTERPRETER.to_string()
}

fn default_build_script_timeout() -> u64 {
    DEFAULT_BUILD_SCRIPT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            python_floor: default_python_floor(),
            python_newest: default_python_newest(),
            python_interpreter: default_python_interpreter(),
            build_script_timeout_secs: default_build_script_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from the default path or return defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::ParseError { path, source })
    }

    /// The interpreter range recipes target
    pub fn python_support(&self) -> Result<PythonSupport, ConfigError> {
        let floor: PyMinor = self
            .python_floor
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("python_floor: {}", e)))?;
        let newest: PyMinor = self
            .python_newest
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("python_newest: {}", e)))?;
        PythonSupport::new(floor, newest).map_err(ConfigError::Invalid)
    }

    pub fn build_script_timeout(&self) -> Duration {
        Duration::from_secs(self.build_script_timeout_secs)
    }
}

/// Returns the config file path: `~/.config/metaforge/config.json`
pub fn config_path() -> Result<PathBuf, ConfigError> {
    // Use XDG_CONFIG_HOME if set, otherwise fall back to ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".config"))
                .unwrap_or_default()
        });

    if config_base.as_os_str().is_empty() {
        return Err(ConfigError::NoConfigDir);
    }

    Ok(config_base.join("metaforge").join("config.json"))
}
