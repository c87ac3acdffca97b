//! Bus configuration
//!
//! ```toml
//! delivery = "deferred"
//! strict_topics = true
//! ```

use serde::Deserialize;

use crate::error::{BusError, BusResult};

/// When queued messages reach their handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Publishing drains the publishing thread's queue before returning
    #[default]
    Immediate,
    /// Messages wait until a connection or the bus is drained explicitly
    Deferred,
}

/// Configuration for a bus tree, fixed at root construction
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Delivery mode
    pub delivery: DeliveryMode,
    /// Log an error when subscribing to a topic missing from the bindings
    pub strict_topics: bool,
}

impl BusConfig {
    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> BusResult<Self> {
        toml::from_str(content).map_err(|e| BusError::Config(e.to_string()))
    }

    /// Deferred delivery preset
    pub fn deferred() -> Self {
        Self {
            delivery: DeliveryMode::Deferred,
            ..Self::default()
        }
    }
}
