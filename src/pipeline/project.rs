use super::{ClassifierSet, Traxelstore};
use crate::classifier::{load_classifier, Classifier};
use crate::config::ProjectOptions;
use crate::error::{PipelineError, Result};
use crate::features::PluginRegistry;
use crate::frames::{ContainerFrames, PathTemplate};
use crate::volume::io::read_container;
use crate::volume::Container;
use log::info;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Containers read once per run, shared between frames and classifiers.
#[derive(Default)]
struct ContainerCache {
    open: BTreeMap<PathBuf, Arc<Container>>,
}

impl ContainerCache {
    fn get(&mut self, path: &Path) -> Result<Arc<Container>> {
        if let Some(container) = self.open.get(path) {
            return Ok(Arc::clone(container));
        }
        if !path.is_file() {
            return Err(PipelineError::configuration(format!(
                "container {} does not exist",
                path.display()
            )));
        }
        let container = Arc::new(read_container(path)?);
        self.open.insert(path.to_path_buf(), Arc::clone(&container));
        Ok(container)
    }
}

fn classifier(
    cache: &mut ContainerCache,
    options: &ProjectOptions,
    kind: &str,
    file: Option<&Path>,
    path: Option<&str>,
) -> Result<Option<Classifier>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let file = file.unwrap_or(&options.project_file);
    let container = cache.get(file)?;
    let classifier = load_classifier(&container, path, &options.classifier_layout())?;
    info!(
        "{} classifier {}:{} with {} sub-models over {} features",
        kind,
        file.display(),
        path,
        classifier.num_models(),
        classifier.selected_features().len()
    );
    Ok(Some(classifier))
}

/// Build an orchestrator over a project container: label frames at the
/// templated path, the raw volume from its own container and the count,
/// division and transition classifiers that are configured.
pub fn open_project(
    options: &ProjectOptions,
    registry: PluginRegistry,
) -> Result<Traxelstore<ContainerFrames>> {
    let mut cache = ContainerCache::default();
    let classifiers = ClassifierSet {
        count: classifier(
            &mut cache,
            options,
            "count",
            options.object_count_classifier_file.as_deref(),
            options.object_count_classifier_path.as_deref(),
        )?,
        division: classifier(
            &mut cache,
            options,
            "division",
            options.division_classifier_file.as_deref(),
            options.division_classifier_path.as_deref(),
        )?,
        transition: classifier(
            &mut cache,
            options,
            "transition",
            options.transition_classifier_file.as_deref(),
            options.transition_classifier_path.as_deref(),
        )?,
    };

    let labels = cache.get(options.label_image_file())?;
    let raw = cache.get(&options.raw_image_file)?;
    let template = PathTemplate::new(options.label_image_path.as_str())?;
    let mut frames = ContainerFrames::open(labels, raw, template, options.raw_image_path.as_str())?;
    if let Some([start, end]) = options.time_range {
        frames = frames.with_time_range(start..end)?;
    }
    Traxelstore::new(frames, registry, classifiers, options.pipeline_options()?)
}
