use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::btree::{BTreeError, MIN_DEGREE_FLOOR};

/// Default minimum degree
/// - Non-root nodes hold 5 to 11 keys
/// - Internal nodes hold 6 to 12 children
pub const DEFAULT_MIN_DEGREE: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("B-tree error: {0}")]
    Tree(#[from] BTreeError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tree construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Minimum degree `t` shared by every node
    pub min_degree: usize,
}

impl TreeConfig {
    pub fn new(min_degree: usize) -> Self {
        Self { min_degree }
    }

    /// Reject a minimum degree below 2 or one whose `2t` overflows
    ///
    /// Whether a full node can be allocated depends on the key type and is
    /// checked again when the tree is built.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_degree < MIN_DEGREE_FLOOR || self.min_degree.checked_mul(2).is_none() {
            return Err(BTreeError::InvalidMinDegree(self.min_degree).into());
        }
        Ok(())
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DEGREE)
    }
}
