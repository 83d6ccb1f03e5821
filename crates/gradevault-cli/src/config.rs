use std::path::{Path, PathBuf};

use gradevault_core::crypto::DEFAULT_KDF_ITERATIONS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GradevaultConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub security: SecuritySection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// History root; defaults to the XDG data directory
    pub root: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Mixed into every hash and key; overridden by GRADEVAULT_SERVER_SECRET
    pub server_secret: Option<String>,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            server_secret: None,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_root() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("history"))
}

pub fn read_config(path: &Path) -> anyhow::Result<GradevaultConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("gradevault"));
        }
    }
    Ok(home_dir()?.join(".config").join("gradevault"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("gradevault"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("gradevault"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
