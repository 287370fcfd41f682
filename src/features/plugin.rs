use super::FeatureMapping;
use crate::error::Result;
use ndarray::ArrayD;

/// A pluggable per-frame feature computer.
///
/// Implementations compute a mapping with one row per label value
/// (`0..=max_label`) and declare which of their outputs must not reach
/// per-object iteration because they are not per-object quantities.
pub trait FeaturePlugin: Send + Sync {
    /// Name used in collision diagnostics.
    fn name(&self) -> &str;

    /// Image dimensionalities the plugin can handle.
    fn supported_dimensions(&self) -> &[usize];

    /// Feature names removed from the merged mapping.
    fn omitted_features(&self) -> &[&str] {
        &[]
    }

    fn compute(
        &self,
        raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        frame: usize,
    ) -> Result<FeatureMapping>;

    fn supports(&self, ndim: usize) -> bool {
        self.supported_dimensions().contains(&ndim)
    }
}
