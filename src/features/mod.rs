//! Region features: the per-frame mapping, the plugin contract, the
//! registry merging plugin outputs, and the plugins shipped with the crate.
mod accumulator;
pub mod mapping;
pub mod plugin;
pub mod polygon;
pub mod registry;
pub mod standard;

pub use mapping::{FeatureArray, FeatureMapping};
pub use plugin::FeaturePlugin;
pub use polygon::{BoundaryPolygon, POLYGON};
pub use registry::PluginRegistry;
pub use standard::StandardObjectFeatures;

/// Object pixel count; read by the size filter.
pub const COUNT: &str = "Count";
/// Object center of mass as computed by the region plugins.
pub const REGION_CENTER: &str = "RegionCenter";
/// Canonical position alias stored on every traxel.
pub const COM: &str = "com";
