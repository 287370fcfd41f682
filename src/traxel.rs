//! A tracked object's feature record at one timestep.
use crate::error::{PipelineError, Result};
use crate::features::COM;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Traxel {
    pub id: u32,
    pub timestep: usize,
    pub scale: [f64; 3],
    features: BTreeMap<String, Vec<f64>>,
}

impl Traxel {
    pub fn new(id: u32, timestep: usize, scale: [f64; 3]) -> Self {
        Self {
            id,
            timestep,
            scale,
            features: BTreeMap::new(),
        }
    }

    /// Add (or reset) a zero-filled feature of `len` values.
    pub fn add_feature_array(&mut self, name: impl Into<String>, len: usize) {
        self.features.insert(name.into(), vec![0.0; len]);
    }

    /// Store a whole feature vector, replacing an existing one.
    pub fn set_feature(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.features.insert(name.into(), values);
    }

    pub fn set_feature_value(&mut self, name: &str, index: usize, value: f64) -> Result<()> {
        let (frame, id) = (self.timestep, self.id);
        let values = self
            .features
            .get_mut(name)
            .ok_or_else(|| missing(name, frame, id))?;
        let len = values.len();
        let slot = values.get_mut(index).ok_or_else(|| {
            PipelineError::shape_mismatch(
                format!("length of feature '{name}'"),
                vec![index + 1],
                vec![len],
            )
        })?;
        *slot = value;
        Ok(())
    }

    pub fn get_feature_value(&self, name: &str, index: usize) -> Result<f64> {
        let values = self.feature(name)?;
        values.get(index).copied().ok_or_else(|| {
            PipelineError::shape_mismatch(
                format!("length of feature '{name}'"),
                vec![index + 1],
                vec![values.len()],
            )
        })
    }

    pub fn feature(&self, name: &str) -> Result<&[f64]> {
        self.features
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| missing(name, self.timestep, self.id))
    }

    pub fn has_feature(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn features(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.features
    }

    pub fn x(&self) -> Result<f64> {
        self.get_feature_value(COM, 0)
    }

    pub fn y(&self) -> Result<f64> {
        self.get_feature_value(COM, 1)
    }

    /// Third coordinate, 0 for 2-D objects.
    pub fn z(&self) -> Result<f64> {
        let com = self.feature(COM)?;
        Ok(com.get(2).copied().unwrap_or(0.0))
    }
}

fn missing(name: &str, frame: usize, object: u32) -> PipelineError {
    PipelineError::MissingFeature {
        feature: name.to_string(),
        frame: Some(frame),
        object: Some(object),
    }
}
