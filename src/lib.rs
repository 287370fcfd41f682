#![doc = include_str!("../README.md")]

// Pipeline surface
pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod division;
pub mod error;
pub mod features;
pub mod frames;
pub mod pipeline;
pub mod store;
pub mod traxel;

// Storage and image helpers shared by the frame accessors and the CLI.
pub mod volume;

// --- High-level re-exports -------------------------------------------------

pub use crate::classifier::{load_classifier, Classifier, ClassifierLayout, ProbabilisticModel};
pub use crate::config::{load_options, ProjectOptions};
pub use crate::diagnostics::{RunReport, StageTiming, TimingBreakdown};
pub use crate::division::{DivisionFeatureEngine, DEFAULT_DIVISION_FEATURES};
pub use crate::error::{PipelineError, Result};
pub use crate::features::{FeatureArray, FeatureMapping, FeaturePlugin, PluginRegistry};
pub use crate::frames::{ContainerFrames, FrameAccessor, ImageSequenceFrames, InMemoryFrames};
pub use crate::pipeline::{
    open_project, ClassifierSet, PipelineOptions, PipelineStage, SizeFilter, Traxelstore,
};
pub use crate::store::TraxelStore;
pub use crate::traxel::Traxel;

// --- Prelude ---------------------------------------------------------------

/// Everything needed to run the pipeline over in-memory frames.
///
/// ```no_run
/// use traxelstore::prelude::*;
/// use ndarray::{ArrayD, IxDyn};
///
/// # fn main() -> traxelstore::Result<()> {
/// let labels = ArrayD::<u32>::zeros(IxDyn(&[64, 64]));
/// let raw = ArrayD::<f32>::zeros(IxDyn(&[64, 64]));
/// let frames = InMemoryFrames::new(vec![(raw, labels)])?;
///
/// let mut pipeline = Traxelstore::new(
///     frames,
///     PluginRegistry::with_default_plugins(),
///     ClassifierSet::default(),
///     PipelineOptions::default(),
/// )?;
/// let store = pipeline.fill_traxel_store()?;
/// println!("traxels={}", store.len());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::{
        ClassifierSet, FrameAccessor, InMemoryFrames, PipelineOptions, PluginRegistry, Traxel,
        TraxelStore, Traxelstore,
    };
}
