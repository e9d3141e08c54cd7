//! Runtime configuration for hierarchy construction.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use strata_core::{Result, StrataError, GRAIN_SIZE, MAX_DEPTH};

fn default_max_depth() -> usize {
    MAX_DEPTH
}
fn default_grain_size() -> usize {
    GRAIN_SIZE
}

/// Policy applied to combined constraint weights during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightPolicy {
    /// Any positive combined weight becomes exactly 1. Keeps constraint
    /// weights from compounding up the level stack; above level 0 a
    /// constraint acts as a hard flag.
    #[default]
    ClampToOne,
    /// Halve combined weights at each level instead of clamping.
    Halve,
}

/// Tunable parameters for [`MultiResolutionHierarchy`].
///
/// All fields have serde defaults, so a partial JSON document is accepted.
///
/// [`MultiResolutionHierarchy`]: crate::MultiResolutionHierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Maximum number of coarsening steps. Construction stops earlier once a
    /// level with a single vertex is reached.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Chunk size handed to parallel-for regions.
    #[serde(default = "default_grain_size")]
    pub grain_size: usize,

    /// How combined constraint weights are folded between levels.
    #[serde(default)]
    pub weight_policy: WeightPolicy,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        HierarchyConfig {
            max_depth: default_max_depth(),
            grain_size: default_grain_size(),
            weight_policy: WeightPolicy::default(),
        }
    }
}

impl HierarchyConfig {
    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            StrataError::invalid_input(format!("cannot open config {}: {e}", path.display()))
        })?;
        let config: HierarchyConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| {
                StrataError::invalid_input(format!("cannot parse config {}: {e}", path.display()))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(StrataError::invalid_input("max_depth must be at least 1"));
        }
        if self.grain_size == 0 {
            return Err(StrataError::invalid_input("grain_size must be at least 1"));
        }
        Ok(())
    }
}
