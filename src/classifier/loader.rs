//! Reads an ensemble classifier and its selected features from a project
//! container.
use super::{Classifier, ProbabilisticModel, RandomForest};
use crate::error::{PipelineError, Result};
use crate::volume::{Container, Node};
use log::debug;
use std::collections::BTreeSet;

const FOREST_PREFIX: &str = "Forest";

/// Names of the groups below a classifier path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierLayout {
    pub forests_group: String,
    pub selected_features_group: String,
    /// Width of the zero-padded sub-model index, `Forest0000` for 4.
    pub zero_padding: usize,
}

impl Default for ClassifierLayout {
    fn default() -> Self {
        Self {
            forests_group: "ClassifierForests".to_string(),
            selected_features_group: "SelectedFeatures".to_string(),
            zero_padding: 4,
        }
    }
}

fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    format!("{base}/{child}")
}

/// Load the classifier stored at `classifier_path` (`/` addresses the
/// container root).
///
/// Sub-models are read as `Forest` followed by the zero-padded index,
/// starting at 0 until the first gap; a `Forest*` entry left over after the
/// gap is a configuration error.
pub fn load_classifier(
    container: &Container,
    classifier_path: &str,
    layout: &ClassifierLayout,
) -> Result<Classifier> {
    let forests_path = join(classifier_path, &layout.forests_group);
    let forests = container
        .group(&forests_path)
        .map_err(PipelineError::required)?;

    let mut remaining: BTreeSet<&str> = forests
        .keys()
        .map(String::as_str)
        .filter(|k| k.starts_with(FOREST_PREFIX))
        .collect();
    let mut models: Vec<Box<dyn ProbabilisticModel>> = Vec::new();
    for index in 0usize.. {
        let name = format!("{FOREST_PREFIX}{index:0width$}", width = layout.zero_padding);
        if !remaining.remove(name.as_str()) {
            break;
        }
        let forest = RandomForest::load(container, &join(&forests_path, &name))?;
        debug!(
            "loaded {} ({} features, {} classes)",
            name,
            forest.feature_count(),
            forest.class_count()
        );
        models.push(Box::new(forest));
    }
    if !remaining.is_empty() {
        return Err(PipelineError::configuration(format!(
            "sub-models {:?} in '{forests_path}' do not continue the sequence of {} forests",
            remaining,
            models.len()
        )));
    }

    let selected = load_selected_features(container, classifier_path, layout)?;
    Classifier::new(models, selected)
}

/// Feature names below `<classifier_path>/<selected_features_group>`,
/// ordered by category and then by name.
pub fn load_selected_features(
    container: &Container,
    classifier_path: &str,
    layout: &ClassifierLayout,
) -> Result<Vec<String>> {
    let path = join(classifier_path, &layout.selected_features_group);
    let categories = container.group(&path).map_err(PipelineError::required)?;
    let mut names = Vec::new();
    for (category, node) in categories {
        match node {
            Node::Group(features) => names.extend(features.keys().cloned()),
            Node::Dataset(_) => {
                return Err(PipelineError::configuration(format!(
                    "selected feature category '{path}/{category}' is not a group"
                )))
            }
        }
    }
    Ok(names)
}
