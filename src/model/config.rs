use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::plugin::spec::{SpecEntry, expand_tilde};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "TETHER_CONFIG";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub plugins: Vec<SpecEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub package_root: String,
    #[serde(default)]
    pub lockfile: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        let mut config = Self::from_toml(defaults)?;

        if let Some(config_path) = user_config_path() {
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)
                    .with_context(|| format!("reading {}", config_path.display()))?;
                config = Self::from_toml(&user_str)
                    .with_context(|| format!("parsing {}", config_path.display()))?;
            }
        }

        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn package_root(&self) -> PathBuf {
        if self.general.package_root.trim().is_empty() {
            return default_package_root();
        }
        expand_tilde(Path::new(self.general.package_root.trim()))
    }

    pub fn lockfile_path(&self) -> PathBuf {
        if self.general.lockfile.trim().is_empty() {
            return default_lockfile();
        }
        expand_tilde(Path::new(self.general.lockfile.trim()))
    }
}

fn user_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|path| !path.is_empty()) {
        return Some(expand_tilde(Path::new(&path)));
    }

    directories::ProjectDirs::from("", "", "tether")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}

fn default_package_root() -> PathBuf {
    if let Some(project_dirs) = directories::ProjectDirs::from("", "", "tether") {
        return project_dirs.data_dir().join("packages");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".local/share/tether/packages");
    }

    PathBuf::from(".tether-packages")
}

fn default_lockfile() -> PathBuf {
    if let Some(project_dirs) = directories::ProjectDirs::from("", "", "tether") {
        return project_dirs.config_dir().join("tether-lock.json");
    }

    if let Some(base_dirs) = directories::BaseDirs::new() {
        return base_dirs.home_dir().join(".config/tether/tether-lock.json");
    }

    PathBuf::from("tether-lock.json")
}
