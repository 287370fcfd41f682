use crate::error::{PipelineError, Result};
use ndarray::Array2;
use std::collections::BTreeMap;

/// Per-object feature dictionary, feature name → flat values.
pub type FeatureDict = BTreeMap<String, Vec<f64>>;

/// Classifier input for a transition between two objects.
///
/// For every selected feature the component-wise difference `a - b` is
/// appended, followed by the component-wise product `a * b`. Returns a
/// single-row matrix.
pub fn transition_feature_vector(
    a: &FeatureDict,
    b: &FeatureDict,
    selected: &[String],
) -> Result<Array2<f32>> {
    let mut row = Vec::new();
    for name in selected {
        let va = a
            .get(name)
            .ok_or_else(|| PipelineError::missing_feature(name.as_str()))?;
        let vb = b
            .get(name)
            .ok_or_else(|| PipelineError::missing_feature(name.as_str()))?;
        if va.len() != vb.len() {
            return Err(PipelineError::shape_mismatch(
                format!("transition feature '{name}'"),
                vec![va.len()],
                vec![vb.len()],
            ));
        }
        row.extend(va.iter().zip(vb).map(|(x, y)| (x - y) as f32));
        row.extend(va.iter().zip(vb).map(|(x, y)| (x * y) as f32));
    }
    let width = row.len();
    Array2::from_shape_vec((1, width), row)
        .map_err(|e| PipelineError::configuration(format!("transition vector layout: {e}")))
}
