//! Configuration module for the execution engine
//!
//! Supports an optional YAML file and a single environment override for the
//! remote execution service URL.

pub mod types;
pub mod loader;

pub use types::*;
pub use loader::*;


use crate::errors::PlaygroundError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, PlaygroundError> {
    ConfigLoader::from_file(path).await
}

/// Validate a configuration
pub fn validate_config(config: &PlaygroundConfig) -> Result<(), PlaygroundError> {
    config.validate()
}
