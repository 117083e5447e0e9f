//! TOML configuration.
//!
//! Every section is optional. With no file at all the server listens on port
//! 80, accepts uploads up to 10 MB and writes to `./backup`.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:80"
//!
//! [upload]
//! max_mb = 10
//! field = "file"
//!
//! [storage]
//! root = "./backup"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:80".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    #[serde(default = "default_max_mb")]
    pub max_mb: u64,
    /// Multipart field that carries the configuration file.
    #[serde(default = "default_field")]
    pub field: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_mb: default_max_mb(),
            field: default_field(),
        }
    }
}

fn default_max_mb() -> u64 {
    10
}
fn default_field() -> String {
    "file".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./backup")
}

impl Config {
    /// Upload limit in bytes (`max_mb << 20`).
    pub fn max_upload_bytes(&self) -> u64 {
        self.upload.max_mb << 20
    }

    /// Replaces the port of `server.bind`, keeping its host part.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.server.bind.rsplit_once(':') {
            Some((host, _)) => host,
            None => self.server.bind.as_str(),
        };
        self.server.bind = format!("{}:{}", host, port);
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.bind.trim().is_empty() {
            anyhow::bail!("server.bind must not be empty");
        }
        if self.upload.max_mb == 0 {
            anyhow::bail!("upload.max_mb must be > 0");
        }
        // Keep `max_mb << 20` inside u64.
        if self.upload.max_mb > u64::MAX >> 20 {
            anyhow::bail!("upload.max_mb is too large");
        }
        if self.upload.field.trim().is_empty() {
            anyhow::bail!("upload.field must not be empty");
        }
        if self.storage.root.as_os_str().is_empty() {
            anyhow::bail!("storage.root must not be empty");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
