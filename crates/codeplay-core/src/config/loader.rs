//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::PlaygroundError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Replaces `execution.base_url` when set.
pub const EXECUTION_URL_ENV: &str = "CODEPLAY_EXECUTION_URL";

pub struct ConfigLoader;
impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, PlaygroundError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            PlaygroundError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub async fn from_optional_file<P: AsRef<Path>>(
        path: P,
    ) -> Result<PlaygroundConfig, PlaygroundError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            log::info!("Loading configuration from file: {}", path.display());
            Self::from_file(path).await
        } else {
            log::debug!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            Self::defaults()
        }
    }

    pub fn defaults() -> Result<PlaygroundConfig, PlaygroundError> {
        let mut config = PlaygroundConfig::default();
        Self::resolve_environment(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<PlaygroundConfig, PlaygroundError> {
        // An empty document deserializes to unit, not to an empty mapping.
        let mut config: PlaygroundConfig = if content.trim().is_empty() {
            PlaygroundConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                PlaygroundError::ConfigurationError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::resolve_environment(&mut config);
        config.validate()?;

        Ok(config)
    }

    fn resolve_environment(config: &mut PlaygroundConfig) {
        if let Ok(url) = env::var(EXECUTION_URL_ENV) {
            if !url.trim().is_empty() {
                log::debug!("Execution service URL overridden by {}", EXECUTION_URL_ENV);
                config.execution.base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
    }
}
