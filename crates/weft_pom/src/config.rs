//! Model configuration
//!
//! ```toml
//! enforce_command_scope = true
//! check_document_committed = false
//! ```

use serde::Deserialize;

use crate::error::{ModelError, ModelResult};

/// Checks the transaction runner performs before a body runs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Physical changes require an active command or undo-transparent action
    pub enforce_command_scope: bool,
    /// Refuse transactions on documents with uncommitted text changes
    pub check_document_committed: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enforce_command_scope: true,
            check_document_committed: true,
        }
    }
}

impl ModelConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> ModelResult<Self> {
        toml::from_str(content).map_err(|e| ModelError::Config(e.to_string()))
    }

    /// Skip host checks entirely, for headless models
    pub fn relaxed() -> Self {
        Self {
            enforce_command_scope: false,
            check_document_committed: false,
        }
    }
}
