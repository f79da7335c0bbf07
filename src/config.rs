use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{
    DEFAULT_LANGUAGE, DEFAULT_RETENTION_DAYS, DEFAULT_SERVICE_TIMEOUT_SECS, DEFAULT_SYNC_DELAY_MS,
};
use crate::error::{QueueError, Result};
use crate::sync::SyncPolicy;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Engine configuration file structure (TOML)
#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the store file (created if missing)
    pub store_dir: PathBuf,
    /// Store name; the store lives at {store_dir}/{name}.sqlite
    pub name: String,
    /// URL of the classification service endpoint (required)
    pub service_url: String,
    /// Timeout for one classification call in seconds (default: 30)
    pub service_timeout_secs: Option<u64>,
    /// Delay between classification calls within one sync run (default: 500)
    pub sync_delay_ms: Option<u64>,
    /// Retention for processed recordings in days (default: 30)
    pub retention_days: Option<i64>,
    /// Language sent when a capture does not carry one (default: "en")
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl EngineConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<EngineConfig> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            QueueError::InvalidConfig(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        let config: EngineConfig = toml::from_str(&raw).map_err(|e| {
            QueueError::InvalidConfig(format!("cannot parse config file '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(QueueError::InvalidConfig(format!(
                "name must be a non-empty file name, got '{}'",
                self.name
            )));
        }

        let url = url::Url::parse(&self.service_url).map_err(|e| {
            QueueError::InvalidConfig(format!("invalid service_url '{}': {}", self.service_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(QueueError::InvalidConfig(format!(
                "service_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.service_timeout_secs == Some(0) {
            return Err(QueueError::InvalidConfig(
                "service_timeout_secs must be at least 1".to_string(),
            ));
        }
        if let Some(days) = self.retention_days {
            if days <= 0 {
                return Err(QueueError::InvalidConfig(format!(
                    "retention_days must be positive, got {}",
                    days
                )));
            }
        }
        Ok(())
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_secs(
            self.service_timeout_secs
                .unwrap_or(DEFAULT_SERVICE_TIMEOUT_SECS),
        )
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            delay_between_items: Duration::from_millis(
                self.sync_delay_ms.unwrap_or(DEFAULT_SYNC_DELAY_MS),
            ),
        }
    }

    pub fn retention_days(&self) -> i64 {
        self.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS)
    }
}
