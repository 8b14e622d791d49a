//! Attribute configuration
//!
//! Constructed once, validated, then shared read-only behind an `Arc` by the
//! writer, its readers and the persistence codec.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{AttributeError, AttributeResult};
use super::types::{BasicType, CollectionType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub basic_type: BasicType,

    #[serde(default = "default_collection_type")]
    pub collection_type: CollectionType,

    /// Keep values in an enum dictionary
    #[serde(default)]
    pub fast_search: bool,

    /// Initial state of the enumerated-save flag
    #[serde(default = "default_enumerated_save")]
    pub enumerated_save: bool,

    /// Minimum time between statistics recomputations
    #[serde(default = "default_stat_update_interval_ms")]
    pub stat_update_interval_ms: u64,

    /// Committed changes that force a statistics recomputation
    #[serde(default = "default_stat_update_change_threshold")]
    pub stat_update_change_threshold: u64,

    #[serde(default)]
    pub is_filter: bool,
}

fn default_collection_type() -> CollectionType {
    CollectionType::Single
}
fn default_enumerated_save() -> bool {
    true
}
fn default_stat_update_interval_ms() -> u64 {
    5_000
}
fn default_stat_update_change_threshold() -> u64 {
    100_000
}

impl AttributeConfig {
    /// Config with defaults for everything but the two types.
    pub fn new(basic_type: BasicType, collection_type: CollectionType) -> Self {
        Self {
            basic_type,
            collection_type,
            fast_search: false,
            enumerated_save: default_enumerated_save(),
            stat_update_interval_ms: default_stat_update_interval_ms(),
            stat_update_change_threshold: default_stat_update_change_threshold(),
            is_filter: false,
        }
    }

    pub fn with_fast_search(mut self, fast_search: bool) -> Self {
        self.fast_search = fast_search;
        self
    }

    pub fn with_enumerated_save(mut self, enumerated_save: bool) -> Self {
        self.enumerated_save = enumerated_save;
        self
    }

    pub fn with_stat_update(mut self, interval_ms: u64, change_threshold: u64) -> Self {
        self.stat_update_interval_ms = interval_ms;
        self.stat_update_change_threshold = change_threshold;
        self
    }

    pub fn with_filter(mut self, is_filter: bool) -> Self {
        self.is_filter = is_filter;
        self
    }

    pub fn from_json(json: &str) -> AttributeResult<Self> {
        let config: AttributeConfig = serde_json::from_str(json)
            .map_err(|e| AttributeError::InvalidConfig(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> AttributeResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AttributeError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> AttributeResult<()> {
        if self.stat_update_interval_ms == 0 {
            return Err(AttributeError::InvalidConfig(
                "stat_update_interval_ms must be > 0".into(),
            ));
        }
        if self.stat_update_change_threshold == 0 {
            return Err(AttributeError::InvalidConfig(
                "stat_update_change_threshold must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn is_multi_value(&self) -> bool {
        self.collection_type.is_multi_value()
    }

    pub fn is_weighted_set(&self) -> bool {
        self.collection_type.is_weighted_set()
    }
}
