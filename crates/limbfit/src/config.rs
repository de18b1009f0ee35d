use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::solver::SolverConfig;

/// Warm-start policy for the solver's initial iterate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmStartConfig {
    /// Re-seed points that (nearly) coincide with their predecessor.
    ///
    /// The observed chain is used verbatim otherwise.
    pub repair_degenerate: bool,
    /// A segment counts as degenerate when its observed length is at most
    /// `degenerate_ratio * target_length`.
    pub degenerate_ratio: f64,
}

impl Default for WarmStartConfig {
    fn default() -> Self {
        Self {
            repair_degenerate: true,
            degenerate_ratio: 1e-2,
        }
    }
}

/// Full configuration of a [`crate::ChainProjector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    pub solver: SolverConfig,
    pub warm_start: WarmStartConfig,
}

impl ProjectorConfig {
    /// Load a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(serde_json::from_str(data)?)
    }
}
