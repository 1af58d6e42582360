//! Editor configuration
//!
//! Loaded from JSON; every field is optional and falls back to the default.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::port::{PortTypes, GENERAL};

// ── Configuration types ─────────────────────────────────────────────────────

/// Top-level editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Port tags registered at start-up ("general" is always added).
    pub port_types: Vec<String>,
    /// Let one output port drive several inputs.
    pub allow_output_fanout: bool,
    /// Run the graph after every successful edit.
    pub evaluate_on_edit: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            port_types: vec![GENERAL.to_string(), "type2".to_string(), "type3".to_string()],
            allow_output_fanout: false,
            evaluate_on_edit: false,
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Fresh port type set seeded from `port_types`
    pub fn build_port_types(&self) -> PortTypes {
        PortTypes::from_tags(self.port_types.iter().cloned())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
