use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use core_types::{SharingScope, TrustTier};
use serde::Deserialize;

/// Process configuration, read from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Tier for pages whose host has no entry in `sites`.
    pub default_tier: TrustTier,
    /// Host name to tier, on top of the built-in trusted hosts.
    pub sites: BTreeMap<String, TrustTier>,
    /// Directive given to undecorated elements; `"none"` turns the fallback off.
    pub default_markup: String,
    pub default_markup_tags: Vec<String>,
    pub server_root: PathBuf,
    pub friendly_errors: bool,
    pub sharing_scope: SharingScope,
    pub strict_handlers: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_tier: TrustTier::Normal,
            sites: BTreeMap::new(),
            default_markup: "none".to_string(),
            default_markup_tags: vec!["pre".to_string()],
            server_root: PathBuf::from("server_root"),
            friendly_errors: true,
            sharing_scope: SharingScope::Page,
            strict_handlers: false,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, message: String },
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, message } => {
                write!(f, "cannot read {}: {message}", path.display())
            }
            ConfigError::Parse(message) => write!(f, "invalid settings: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        let settings = Self::from_toml_str(&source)?;
        log::debug!(target: "livedoc", "settings loaded from {}", path.display());
        Ok(settings)
    }
}
