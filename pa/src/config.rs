//! Planagent configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main planagent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Live context budget
    pub context: ContextConfig,

    /// Session persistence
    pub storage: StorageConfig,

    /// Undo/redo
    pub undo: UndoConfig,

    /// External service calls
    pub services: ServicesConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.context.budget_tokens == 0 {
            return Err(eyre::eyre!("context.budget-tokens must be greater than zero"));
        }
        let ratio = self.context.compression_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(eyre::eyre!(
                "context.compression-threshold must be in (0, 1], got {}",
                ratio
            ));
        }
        if self.storage.max_stored_messages < self.context.retain_messages {
            return Err(eyre::eyre!(
                "storage.max-stored-messages ({}) must not be below context.retain-messages ({})",
                self.storage.max_stored_messages,
                self.context.retain_messages
            ));
        }
        if self.storage.compression_level > 9 {
            return Err(eyre::eyre!(
                "storage.compression-level must be 0-9, got {}",
                self.storage.compression_level
            ));
        }
        if self.undo.capacity == 0 {
            return Err(eyre::eyre!("undo.capacity must be at least 1"));
        }
        if self.services.timeout_ms == 0 {
            return Err(eyre::eyre!("services.timeout-ms must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .planagent.yml
        let local_config = PathBuf::from(".planagent.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/planagent/planagent.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("planagent").join("planagent.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Live context budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Nominal budget in token-equivalents
    #[serde(rename = "budget-tokens")]
    pub budget_tokens: u32,

    /// Fraction of the budget at which compression runs
    #[serde(rename = "compression-threshold")]
    pub compression_threshold: f64,

    /// Most recent messages always kept verbatim
    #[serde(rename = "retain-messages")]
    pub retain_messages: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_tokens: 8000,
            compression_threshold: 0.7,
            retain_messages: 4,
        }
    }
}

/// Session persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one file per session
    #[serde(rename = "sessions-dir")]
    pub sessions_dir: PathBuf,

    /// Messages kept verbatim on disk; older ones are summarized at save
    #[serde(rename = "max-stored-messages")]
    pub max_stored_messages: usize,

    /// Deflate level for session bodies (0-9)
    #[serde(rename = "compression-level")]
    pub compression_level: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: sessionstore::default_store_path(),
            max_stored_messages: crate::store::MAX_STORED_MESSAGES,
            compression_level: sessionstore::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// Undo/redo
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Checkpoints kept before the oldest is evicted
    pub capacity: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            capacity: crate::ledger::DEFAULT_UNDO_CAPACITY,
        }
    }
}

/// External service calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Bounded wait for each generate/summarize call in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.context.budget_tokens, 8000);
        assert_eq!(config.context.retain_messages, 4);
        assert_eq!(config.storage.max_stored_messages, 20);
        assert_eq!(config.storage.compression_level, 6);
        assert_eq!(config.undo.capacity, 10);
        assert_eq!(config.services.timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
context:
  budget-tokens: 16000
  compression-threshold: 0.8
  retain-messages: 6

storage:
  sessions-dir: /tmp/planagent-sessions
  max-stored-messages: 30
  compression-level: 9

undo:
  capacity: 5

services:
  timeout-ms: 5000
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.context.budget_tokens, 16000);
        assert_eq!(config.context.compression_threshold, 0.8);
        assert_eq!(config.context.retain_messages, 6);
        assert_eq!(config.storage.sessions_dir, PathBuf::from("/tmp/planagent-sessions"));
        assert_eq!(config.storage.max_stored_messages, 30);
        assert_eq!(config.undo.capacity, 5);
        assert_eq!(config.services.timeout_ms, 5000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
undo:
  capacity: 3
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.undo.capacity, 3);
        assert_eq!(config.context.budget_tokens, 8000);
        assert_eq!(config.storage.max_stored_messages, 20);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = Config::default();
        config.context.compression_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.undo.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.max_stored_messages = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("planagent.yml");
        fs::write(&path, "services:\n  timeout-ms: 1000\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.services.timeout_ms, 1000);

        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
