//! Dispatcher configuration
//!
//! Usually embedded in the owning component's own config file, or loaded
//! from a standalone TOML file.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for a single dispatcher instance
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Name used in log lines and handed to middleware with every action
    #[serde(default = "default_label")]
    pub label: String,

    /// Whether the dispatcher starts out draining its pipeline
    #[serde(default = "default_start_active")]
    pub start_active: bool,

    /// Log a warning whenever the pipeline grows past this many pending
    /// actions. `None` turns the warning off.
    #[serde(default = "default_queue_warn_threshold")]
    pub queue_warn_threshold: Option<usize>,
}

fn default_label() -> String {
    "dispatcher".to_string()
}

fn default_start_active() -> bool {
    true
}

fn default_queue_warn_threshold() -> Option<usize> {
    Some(1024)
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            start_active: default_start_active(),
            queue_warn_threshold: default_queue_warn_threshold(),
        }
    }
}

impl DispatcherConfig {
    /// Parse a config from TOML text; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load config from `path`, or use defaults if the file is missing or broken
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    log::info!("Loaded dispatcher config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                log::debug!("No dispatcher config at {}: {}", path.display(), e);
            }
        }

        log::debug!("Using default dispatcher config");
        Self::default()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
