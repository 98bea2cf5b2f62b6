//! Configuration file loading.
//!
//! Location precedence:
//! 1. explicit path (from the `--config` CLI flag)
//! 2. `PBSYNC_CONFIG` environment variable
//! 3. `<config dir>/pbsync/config.toml`
//!
//! A missing file is not an error: every field has a default, and the CLI
//! can still supply the rest.

use crate::catalog::CatalogOptions;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "PBSYNC_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Built-in defaults.
pub struct ConfigDefaults;

impl ConfigDefaults {
    pub const HISTORY_PATH: &'static str = "~/.local/share/zathura/history";
    pub const MOUNT_PREFIX_PATTERN: &'static str = r"^/mnt/ext\d+/";
}

// Thin wrappers for serde's #[serde(default = "...")] requirement
fn default_history_path() -> String {
    ConfigDefaults::HISTORY_PATH.to_string()
}
fn default_mount_prefix_pattern() -> String {
    ConfigDefaults::MOUNT_PREFIX_PATTERN.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// History file to update; `~` is expanded when the store opens it.
    #[serde(default = "default_history_path")]
    pub history_path: String,
    /// Where the device's books live on this machine, prepended to every
    /// catalog path to form history keys.
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default = "default_mount_prefix_pattern")]
    pub mount_prefix_pattern: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_path: default_history_path(),
            prefix: None,
            mount_prefix_pattern: default_mount_prefix_pattern(),
        }
    }
}

impl Config {
    /// Default config file location, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("pbsync").join("config.toml"))
    }

    /// Pick the config file to load: `explicit` > `$PBSYNC_CONFIG` > default.
    pub fn resolve_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path)
    }

    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            mount_prefix_pattern: self.mount_prefix_pattern.clone(),
        }
    }
}
