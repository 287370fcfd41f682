//! Knobs of the orchestrator.
use crate::division::DEFAULT_DIVISION_FEATURES;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DETECTION_PROBABILITY: &str = "detProb";
pub const DEFAULT_DIVISION_PROBABILITY: &str = "divProb";

/// Inclusive pixel-count window; objects outside produce no traxel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeFilter {
    pub min: f64,
    pub max: f64,
}

impl SizeFilter {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min <= max) {
            return Err(PipelineError::configuration(format!(
                "size filter minimum {min} exceeds maximum {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, count: f64) -> bool {
        count >= self.min && count <= self.max
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOptions {
    /// Voxel scale (x, y, z) copied onto every traxel.
    pub scale: [f64; 3],
    /// Feature name receiving the count classifier's probabilities.
    pub detection_probability: String,
    /// Feature name receiving the division classifier's probabilities.
    pub division_probability: String,
    /// `<operation>_<feature>` names evaluated in the division pass.
    pub division_features: Vec<String>,
    pub size_filter: Option<SizeFilter>,
    /// Run passes across frames on the rayon pool.
    pub parallel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            scale: [1.0; 3],
            detection_probability: DEFAULT_DETECTION_PROBABILITY.to_string(),
            division_probability: DEFAULT_DIVISION_PROBABILITY.to_string(),
            division_features: DEFAULT_DIVISION_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            size_filter: None,
            parallel: false,
        }
    }
}
