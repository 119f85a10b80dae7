use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("config file not found")]
    NotFound,
    #[error("failed to parse config: {0}")]
    ParseError(String),
    #[error("failed to read config: {0}")]
    IoError(String),
}

/// Per-package settings, keyed by package directory name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Whether UI scripting is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Roots searched for script packages, in order
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,

    /// Directory under each search root holding the packages (default: ui_scripts)
    #[serde(default = "default_package_dir")]
    pub package_dir: String,

    /// Script each package starts from, without extension (default: __init__)
    #[serde(default = "default_entry_script")]
    pub entry_script: String,

    /// Whether the built-in packages load before user packages
    #[serde(default = "default_true")]
    pub load_builtins: bool,

    /// Restart the engine when package files change (default: false)
    #[serde(default)]
    pub hot_reload: bool,

    /// Hot reload scan interval in milliseconds (default: 1000ms)
    #[serde(default = "default_hot_reload_interval")]
    pub hot_reload_interval_ms: u64,

    /// Per-package settings (package name -> config)
    #[serde(default)]
    pub packages: BTreeMap<String, PackageConfig>,
}

fn default_true() -> bool {
    true
}

fn default_package_dir() -> String {
    "ui_scripts".to_string()
}

fn default_entry_script() -> String {
    "__init__".to_string()
}

fn default_hot_reload_interval() -> u64 {
    1000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_paths: Vec::new(),
            package_dir: default_package_dir(),
            entry_script: default_entry_script(),
            load_builtins: true,
            hot_reload: false,
            hot_reload_interval_ms: default_hot_reload_interval(),
            packages: BTreeMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Default config file location, `None` when no home directory is known
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "luiscript").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Default search root, the platform data directory
    pub fn default_search_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "luiscript").map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Package directories under every search root
    pub fn package_roots(&self) -> Vec<PathBuf> {
        self.search_paths
            .iter()
            .map(|root| root.join(&self.package_dir))
            .collect()
    }

    /// Packages are enabled unless configured otherwise
    pub fn is_package_enabled(&self, name: &str) -> bool {
        self.packages.get(name).map_or(true, |p| p.enabled)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content =
            fs::read_to_string(path).map_err(|e| ConfigLoadError::IoError(e.to_string()))?;
        let config =
            toml::from_str(&content).map_err(|e| ConfigLoadError::ParseError(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}
