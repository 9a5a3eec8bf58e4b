//! Configuration type definitions for the execution engine
//!
//! Every section is optional. A missing file, or a file with only the keys a
//! user cares about, yields the same behavior as the stock playground: the
//! public execution service, a one second quiet period and a 50/50 split.

use crate::errors::PlaygroundError;
use crate::language::LanguageTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Entries here are merged over the built-in language table.
    #[serde(default = "LanguageTable::empty")]
    pub languages: LanguageTable,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_loop_iteration_limit")]
    pub loop_iteration_limit: u64,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: usize,
}

/// Split between editor and preview, as fractions of the container width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_initial_fraction")]
    pub initial_fraction: f64,
    #[serde(default = "default_min_fraction")]
    pub min_fraction: f64,
    #[serde(default = "default_max_fraction")]
    pub max_fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "https://emkc.org/api/v2/piston".to_string()
}

fn default_timeout_secs() -> u64 { 10 }
fn default_debounce_ms() -> u64 { 1000 }
fn default_loop_iteration_limit() -> u64 { 10_000_000 }
fn default_recursion_limit() -> usize { 512 }
fn default_max_source_bytes() -> usize { 1_000_000 }
fn default_initial_fraction() -> f64 { 0.5 }
fn default_min_fraction() -> f64 { 0.2 }
fn default_max_fraction() -> f64 { 0.8 }

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            loop_iteration_limit: default_loop_iteration_limit(),
            recursion_limit: default_recursion_limit(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            initial_fraction: default_initial_fraction(),
            min_fraction: default_min_fraction(),
            max_fraction: default_max_fraction(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), PlaygroundError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.min_fraction) || !in_unit(self.max_fraction) {
            return Err(PlaygroundError::ConfigurationError(format!(
                "Layout bounds must lie within [0, 1], got [{}, {}]",
                self.min_fraction, self.max_fraction
            )));
        }
        if self.min_fraction > self.max_fraction {
            return Err(PlaygroundError::ConfigurationError(format!(
                "Layout min_fraction {} exceeds max_fraction {}",
                self.min_fraction, self.max_fraction
            )));
        }
        if !(self.min_fraction..=self.max_fraction).contains(&self.initial_fraction) {
            return Err(PlaygroundError::ConfigurationError(format!(
                "Layout initial_fraction {} is outside [{}, {}]",
                self.initial_fraction, self.min_fraction, self.max_fraction
            )));
        }
        Ok(())
    }
}

impl PlaygroundConfig {
    /// Built-in language table with this configuration's overrides applied.
    pub fn language_table(&self) -> LanguageTable {
        let mut table = LanguageTable::default();
        table.merge(&self.languages);
        table
    }

    pub fn validate(&self) -> Result<(), PlaygroundError> {
        if self.execution.base_url.trim().is_empty() {
            return Err(PlaygroundError::ConfigurationError(
                "execution.base_url must not be empty".to_string(),
            ));
        }
        if !self.execution.base_url.starts_with("http://")
            && !self.execution.base_url.starts_with("https://")
        {
            return Err(PlaygroundError::ConfigurationError(format!(
                "execution.base_url must be an http(s) URL, got '{}'",
                self.execution.base_url
            )));
        }
        if self.execution.timeout_secs == 0 {
            return Err(PlaygroundError::ConfigurationError(
                "execution.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sandbox.max_source_bytes == 0 {
            return Err(PlaygroundError::ConfigurationError(
                "sandbox.max_source_bytes must be greater than zero".to_string(),
            ));
        }
        self.layout.validate()?;
        self.language_table().validate()
    }
}
