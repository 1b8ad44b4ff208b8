//! Configuration for query tags.
//!
//! The only recognised option is the statement cache capacity. Parsing
//! rejects unknown keys instead of forwarding them anywhere.

use crate::error::{Result, SqlTagError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options applied when a query tag is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields, default)]
pub struct QueryTagConfig {
    /// Maximum number of prepared statements kept per tag.
    ///
    /// `0` disables caching: every query is prepared, run once and released.
    pub cache_capacity: usize,
}

impl QueryTagConfig {
    /// Default number of cached statements.
    pub const DEFAULT_CACHE_CAPACITY: usize = 100;

    /// Configuration with an explicit cache capacity.
    pub fn with_cache_capacity(cache_capacity: usize) -> Self {
        Self { cache_capacity }
    }

    /// Parse a configuration from JSON, e.g. `{"cache_capacity": 5}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SqlTagError::Config {
            message: format!("Invalid query tag configuration: {}", e),
        })
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| SqlTagError::io_with_path(e, path))?;
        Self::from_json_str(&contents)
    }
}

impl Default for QueryTagConfig {
    fn default() -> Self {
        Self {
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}
