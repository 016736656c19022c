//! Bot configuration
//!
//! Plain YAML settings loaded at startup. A missing or unreadable file
//! falls back to defaults so a fresh deployment works out of the box.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::detector::DetectorConfig;

/// Default configuration file location
pub const CONFIG_FILE: &str = "data/spamwarden.yaml";

/// Top-level bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Flood detection windows and thresholds
    pub detector: DetectorConfig,
    /// How long an automatic flood ban lasts, in minutes
    pub autoban_duration_minutes: u64,
    /// Channel that receives public enforcement notices
    pub enforcement_log_channel_id: Option<u64>,
    /// Where case records are persisted
    pub case_file: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            autoban_duration_minutes: 60,
            enforcement_log_channel_id: None,
            case_file: "data/cases.yaml".to_string(),
        }
    }
}

impl BotConfig {
    /// Load from the default location
    pub async fn load() -> Self {
        Self::load_from(CONFIG_FILE).await
    }

    /// Load from a specific path, falling back to defaults
    pub async fn load_from(path: &str) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    info!(path, "configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(path, error = %e, "bad configuration file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path, "no configuration file, using defaults");
                Self::default()
            }
        }
    }

    /// Write the current configuration out as YAML
    ///
    /// # Errors
    /// Fails if the directory cannot be created or the file cannot be
    /// written.
    pub async fn save_to(
        &self,
        path: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let yaml = serde_yaml::to_string(self)?;
        tokio::fs::write(path, yaml).await?;
        Ok(())
    }
}
