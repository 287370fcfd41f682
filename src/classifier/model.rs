use ndarray::{Array2, ArrayView2};

/// A trained probabilistic sub-model of an ensemble.
///
/// `predict_probabilities` receives one row per object with exactly
/// `feature_count()` columns and returns one row of `class_count()`
/// probabilities per object.
pub trait ProbabilisticModel: Send + Sync {
    fn feature_count(&self) -> usize;

    fn class_count(&self) -> usize;

    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Array2<f64>;
}

/// Model returning the same distribution for every object.
#[derive(Clone, Debug)]
pub struct ConstantModel {
    feature_count: usize,
    probabilities: Vec<f64>,
}

impl ConstantModel {
    pub fn new(feature_count: usize, probabilities: Vec<f64>) -> Self {
        Self {
            feature_count,
            probabilities,
        }
    }
}

impl ProbabilisticModel for ConstantModel {
    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn class_count(&self) -> usize {
        self.probabilities.len()
    }

    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Array2<f64> {
        let classes = self.probabilities.len();
        Array2::from_shape_fn((features.nrows(), classes), |(_, c)| self.probabilities[c])
    }
}
