//! Ensemble classifier over per-frame feature mappings.
//!
//! A classifier owns one or more trained sub-models and the ordered list of
//! feature names they were trained on. Probabilities of all sub-models are
//! summed, not averaged.
pub mod forest;
pub mod loader;
pub mod model;

pub use forest::{DecisionTree, RandomForest};
pub use loader::{load_classifier, ClassifierLayout};
pub use model::{ConstantModel, ProbabilisticModel};

use crate::error::{PipelineError, Result};
use crate::features::{FeatureArray, FeatureMapping};
use ndarray::{s, Array2, ArrayView2};

pub struct Classifier {
    models: Vec<Box<dyn ProbabilisticModel>>,
    selected_features: Vec<String>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("models", &self.models.len())
            .field("feature_count", &self.feature_count())
            .field("class_count", &self.class_count())
            .field("selected_features", &self.selected_features)
            .finish()
    }
}

impl Classifier {
    /// Validates that there is at least one sub-model and that all of them
    /// agree on feature and class counts.
    pub fn new(
        models: Vec<Box<dyn ProbabilisticModel>>,
        selected_features: Vec<String>,
    ) -> Result<Self> {
        let Some(first) = models.first() else {
            return Err(PipelineError::configuration("classifier without sub-models"));
        };
        let (features, classes) = (first.feature_count(), first.class_count());
        for (i, model) in models.iter().enumerate().skip(1) {
            if model.feature_count() != features || model.class_count() != classes {
                return Err(PipelineError::configuration(format!(
                    "sub-model {i} has {} features / {} classes, sub-model 0 has {features} / {classes}",
                    model.feature_count(),
                    model.class_count()
                )));
            }
        }
        Ok(Self {
            models,
            selected_features,
        })
    }

    pub fn feature_count(&self) -> usize {
        self.models.first().map_or(0, |m| m.feature_count())
    }

    pub fn class_count(&self) -> usize {
        self.models.first().map_or(0, |m| m.class_count())
    }

    pub fn num_models(&self) -> usize {
        self.models.len()
    }

    pub fn selected_features(&self) -> &[String] {
        &self.selected_features
    }

    /// Input matrix of all objects: the selected features concatenated
    /// column-wise in order, cast to `f32`.
    pub fn extract_feature_vector(&self, mapping: &FeatureMapping) -> Result<Array2<f32>> {
        let mut columns = Vec::with_capacity(self.selected_features.len());
        for name in &self.selected_features {
            match mapping.get(name) {
                Some(FeatureArray::Dense(m)) => columns.push(m),
                Some(FeatureArray::List(_)) => {
                    return Err(PipelineError::configuration(format!(
                        "selected feature '{name}' is list-typed"
                    )))
                }
                None => return Err(PipelineError::missing_feature(name.as_str())),
            }
        }
        let width: usize = columns.iter().map(|m| m.ncols()).sum();
        let mut out = Array2::<f32>::zeros((mapping.num_objects(), width));
        let mut offset = 0;
        for m in columns {
            out.slice_mut(s![.., offset..offset + m.ncols()])
                .assign(&m.mapv(|v| v as f32));
            offset += m.ncols();
        }
        Ok(out)
    }

    /// Sum of every sub-model's probabilities for a prepared input matrix.
    pub fn predict_matrix(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f64>> {
        let expected = self.feature_count();
        if features.ncols() != expected {
            return Err(PipelineError::FeatureCountMismatch {
                expected,
                found: features.ncols(),
            });
        }
        let mut total = Array2::<f64>::zeros((features.nrows(), self.class_count()));
        for model in &self.models {
            total += &model.predict_probabilities(features);
        }
        Ok(total)
    }

    /// Per-object class probabilities, shape `(num_objects, class_count)`.
    pub fn predict_probabilities(&self, mapping: &FeatureMapping) -> Result<Array2<f64>> {
        let features = self.extract_feature_vector(mapping)?;
        self.predict_matrix(features.view())
    }
}
