//! Service settings, read from an optional TOML file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analytics::DEFAULT_RANKING_SIZE;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Largest upload body the service accepts, in bytes.
    pub max_upload_bytes: usize,
    /// Rows in the top and bottom rankings when a request does not say.
    pub ranking_size: usize,
    /// Default `env_logger` filter; `RUST_LOG` overrides it.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 16 * 1024 * 1024,
            ranking_size: DEFAULT_RANKING_SIZE,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Defaults when no file is given. A path that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}
