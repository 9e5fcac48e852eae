//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! [store]
//! max_edges_per_node = 10
//! incoming_weight = 0.3
//!
//! [extraction]
//! timeout_ms = 5000
//!
//! [persistence]
//! path = "state/rgl.json"
//! timeout_ms = 2000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Sparsity and merge parameters for the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum outgoing statements kept per main node.
    #[serde(default = "default_max_edges")]
    pub max_edges_per_node: usize,
    /// Share of an incoming weight in a merge; the stored weight keeps the rest.
    #[serde(default = "default_incoming_weight")]
    pub incoming_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_timeout")]
    pub timeout_ms: u64,
    /// Probability the heuristic extractor assigns when the text gives none.
    #[serde(default = "default_probability")]
    pub default_probability: String,
    /// Condition the heuristic extractor assigns when the text gives none.
    #[serde(default = "default_condition")]
    pub default_condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// State document location. `None` keeps the engine in memory only.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_io_timeout")]
    pub timeout_ms: u64,
}

fn default_max_edges() -> usize { 10 }
fn default_incoming_weight() -> f64 { 0.3 }
fn default_extraction_timeout() -> u64 { 5_000 }
fn default_probability() -> String { "0.80".into() }
fn default_condition() -> String { "general".into() }
fn default_io_timeout() -> u64 { 2_000 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_edges_per_node: default_max_edges(),
            incoming_weight: default_incoming_weight(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_extraction_timeout(),
            default_probability: default_probability(),
            default_condition: default_condition(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            timeout_ms: default_io_timeout(),
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PersistenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn with_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence.path = Some(path.into());
        self
    }

    pub fn with_max_edges_per_node(mut self, max: usize) -> Self {
        self.store.max_edges_per_node = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.max_edges_per_node == 0 {
            return Err(Error::Config("store.max_edges_per_node must be at least 1".into()));
        }
        let w = self.store.incoming_weight;
        if !w.is_finite() || !(0.0..=1.0).contains(&w) {
            return Err(Error::Config(format!("store.incoming_weight {w} outside [0, 1]")));
        }
        if self.extraction.timeout_ms == 0 {
            return Err(Error::Config("extraction.timeout_ms must be positive".into()));
        }
        if self.persistence.timeout_ms == 0 {
            return Err(Error::Config("persistence.timeout_ms must be positive".into()));
        }
        crate::model::Probability::parse(&self.extraction.default_probability)
            .map_err(|e| Error::Config(format!("extraction.default_probability: {e}")))?;
        Ok(())
    }
}
