//! Configuration for sessionstore

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the session store directory
    #[serde(default = "crate::default_store_path")]
    pub store_path: PathBuf,

    /// Deflate level used when rewriting sessions
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub log_level: Option<String>,
}

fn default_compression_level() -> u32 {
    crate::DEFAULT_COMPRESSION_LEVEL
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: crate::default_store_path(),
            compression_level: default_compression_level(),
            log_level: None,
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            return Ok(config);
        }

        // Try default locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("planagent").join("sessionstore.yml")),
            Some(PathBuf::from("sessionstore.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        Ok(Config::default())
    }
}
