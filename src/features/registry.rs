//! Explicit plugin registry: applies every compatible plugin to a frame and
//! merges the outputs into one mapping.
use super::{BoundaryPolygon, FeatureMapping, FeaturePlugin, StandardObjectFeatures};
use crate::error::{PipelineError, Result};
use log::debug;
use ndarray::ArrayD;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn FeaturePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the plugins shipped by this crate.
    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(StandardObjectFeatures::default()));
        registry.register(Box::new(BoundaryPolygon));
        registry
    }

    pub fn register(&mut self, plugin: Box<dyn FeaturePlugin>) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run all plugins supporting the label image's dimensionality.
    ///
    /// Fails on feature-name collisions between plugins and on plugins
    /// disagreeing about the number of objects. Names omitted by any
    /// registered plugin are removed from the result.
    pub fn compute(
        &self,
        raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        frame: usize,
    ) -> Result<FeatureMapping> {
        let ndim = labels.ndim();
        let mut merged = FeatureMapping::new();
        let mut owners: BTreeMap<String, &str> = BTreeMap::new();
        let mut applied = 0usize;

        for plugin in self.plugins.iter().filter(|p| p.supports(ndim)) {
            let output = plugin.compute(raw, labels, frame)?;
            applied += 1;
            debug!(
                "frame {} plugin '{}' produced {} features",
                frame,
                plugin.name(),
                output.len()
            );
            for (name, array) in output.iter() {
                if let Some(first) = owners.get(name) {
                    return Err(PipelineError::FeatureCollision {
                        feature: name.to_string(),
                        frame,
                        first: first.to_string(),
                        second: plugin.name().to_string(),
                    });
                }
                merged.insert(name, array.clone()).map_err(|err| match err {
                    PipelineError::ShapeMismatch {
                        expected, found, ..
                    } => PipelineError::shape_mismatch(
                        format!(
                            "object count of '{name}' from plugin '{}' in frame {frame}",
                            plugin.name()
                        ),
                        expected,
                        found,
                    ),
                    other => other,
                })?;
                owners.insert(name.to_string(), plugin.name());
            }
        }

        if applied == 0 {
            return Err(PipelineError::configuration(format!(
                "no feature plugin supports {ndim}-D images"
            )));
        }

        for plugin in &self.plugins {
            for name in plugin.omitted_features() {
                merged.remove(name);
            }
        }
        Ok(merged)
    }
}
