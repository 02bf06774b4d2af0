//! Reduction configuration
//!
//! A configuration file is TOML:
//!
//! ```toml
//! seed = 42
//! parallel = true
//! renormalize_normals = true
//!
//! [strategy]
//! kind = "voxel_merge"
//! voxel_size = 0.01
//!
//! [policy]
//! numeric = "mean"
//! other = "first"
//!
//! [policy.overrides]
//! opacity = "mode"
//! ```
//!
//! Every key is optional.

use crate::engine::ReductionStrategy;
use crate::policy::AggregationPolicy;
use serde::{Deserialize, Serialize};
use splatlod_core::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LodConfig {
    pub strategy: ReductionStrategy,
    pub seed: Option<u64>,
    pub parallel: bool,
    pub renormalize_normals: bool,
    pub policy: AggregationPolicy,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            strategy: ReductionStrategy::default(),
            seed: None,
            parallel: true,
            renormalize_normals: true,
            policy: AggregationPolicy::default(),
        }
    }
}

impl LodConfig {
    /// Parse and validate a TOML configuration
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: LodConfig =
            toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()
    }
}
