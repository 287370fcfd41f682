//! Orchestrator turning per-frame volumes into an assembled traxel store.
//!
//! Stages run strictly in order:
//! - region features for every frame of the time range,
//! - division features for every frame with a successor (only with a
//!   division classifier),
//! - assembly of one traxel per object, with classifier probabilities.
//!
//! Per-object queries (feature dictionaries, transition vectors and
//! transition probabilities) are answered once the store is assembled.
mod options;
mod project;
mod transition;
mod traxelstore;

pub use options::{
    PipelineOptions, SizeFilter, DEFAULT_DETECTION_PROBABILITY, DEFAULT_DIVISION_PROBABILITY,
};
pub use project::open_project;
pub use transition::{transition_feature_vector, FeatureDict};
pub use traxelstore::{ClassifierSet, Traxelstore};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PipelineStage {
    Uninitialized,
    FeaturesExtracted,
    DivisionFeaturesExtracted,
    Assembled,
}
