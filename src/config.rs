//! Configuration file
//!
//! Read from `$FLATFS_CONFIG` if set, otherwise
//! `~/.config/flatfs/config.json`. Every field is optional.

use crate::codec::Layout;
use crate::model::Container;
use crate::seal::AesGcmSealer;
use crate::vault::default_tree;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "FLATFS_CONFIG";

/// Store file used when neither config nor CLI names one
pub const DEFAULT_STORE_PATH: &str = "tree.flatfs";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Record store file
    pub store_path: Option<PathBuf>,
    /// Pointer layout used when persisting
    pub layout: Option<Layout>,
    /// Passphrase for `seal` / `unseal`
    pub seal_key: Option<String>,
    /// Tree seeded into an empty store
    pub default_tree: Option<Container>,
}

impl Config {
    /// Location of the config file
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".into()))?
            .join("flatfs")
            .join("config.json"))
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH))
    }

    pub fn layout(&self) -> Layout {
        self.layout.unwrap_or_default()
    }

    pub fn default_tree(&self) -> Container {
        self.default_tree.clone().unwrap_or_else(default_tree)
    }

    /// Sealer for the configured passphrase, if any
    pub fn sealer(&self) -> Option<AesGcmSealer> {
        self.seal_key.as_deref().map(AesGcmSealer::new)
    }
}
