//! Project options: where frames and classifiers live and how the run is
//! parameterized. Loaded from JSON; every field has a default.
use crate::classifier::ClassifierLayout;
use crate::division::DEFAULT_DIVISION_FEATURES;
use crate::error::{PipelineError, Result};
use crate::frames::DEFAULT_LABEL_IMAGE_PATH;
use crate::pipeline::{
    PipelineOptions, SizeFilter, DEFAULT_DETECTION_PROBABILITY, DEFAULT_DIVISION_PROBABILITY,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectOptions {
    /// Project container holding label images and classifiers.
    pub project_file: PathBuf,
    /// Container with the label images; the project file when unset.
    pub label_image_file: Option<PathBuf>,
    /// Five-placeholder template `(t, t+1, x, y, z)` of a label dataset.
    pub label_image_path: String,
    /// Container with the raw volume.
    pub raw_image_file: PathBuf,
    /// Dataset of the raw volume, time on the leading axis.
    pub raw_image_path: String,

    pub object_count_classifier_file: Option<PathBuf>,
    /// `None` disables the count classifier.
    pub object_count_classifier_path: Option<String>,
    pub division_classifier_file: Option<PathBuf>,
    /// `None` disables division handling.
    pub division_classifier_path: Option<String>,
    pub transition_classifier_file: Option<PathBuf>,
    pub transition_classifier_path: Option<String>,

    pub selected_features_group_name: String,
    pub classifier_forests_group_name: String,
    pub random_forest_zero_padding_width: usize,

    /// Inclusive `[min, max]` pixel count.
    pub size_filter: Option<[f64; 2]>,
    /// `[start, end)` sub-range of the stored frames.
    pub time_range: Option<[usize; 2]>,
    pub scale: [f64; 3],
    pub detection_probability_feature_name: String,
    pub division_probability_feature_name: String,
    pub division_features: Vec<String>,
    pub parallel: bool,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            project_file: PathBuf::new(),
            label_image_file: None,
            label_image_path: DEFAULT_LABEL_IMAGE_PATH.to_string(),
            raw_image_file: PathBuf::new(),
            raw_image_path: String::new(),
            object_count_classifier_file: None,
            object_count_classifier_path: Some("/CountClassification".to_string()),
            division_classifier_file: None,
            division_classifier_path: Some("/DivisionDetection".to_string()),
            transition_classifier_file: None,
            transition_classifier_path: None,
            selected_features_group_name: "SelectedFeatures".to_string(),
            classifier_forests_group_name: "ClassifierForests".to_string(),
            random_forest_zero_padding_width: 4,
            size_filter: None,
            time_range: None,
            scale: [1.0; 3],
            detection_probability_feature_name: DEFAULT_DETECTION_PROBABILITY.to_string(),
            division_probability_feature_name: DEFAULT_DIVISION_PROBABILITY.to_string(),
            division_features: DEFAULT_DIVISION_FEATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            parallel: false,
        }
    }
}

impl ProjectOptions {
    pub fn label_image_file(&self) -> &Path {
        self.label_image_file.as_deref().unwrap_or(&self.project_file)
    }

    pub fn classifier_layout(&self) -> ClassifierLayout {
        ClassifierLayout {
            forests_group: self.classifier_forests_group_name.clone(),
            selected_features_group: self.selected_features_group_name.clone(),
            zero_padding: self.random_forest_zero_padding_width,
        }
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let size_filter = self
            .size_filter
            .map(|[min, max]| SizeFilter::new(min, max))
            .transpose()?;
        Ok(PipelineOptions {
            scale: self.scale,
            detection_probability: self.detection_probability_feature_name.clone(),
            division_probability: self.division_probability_feature_name.clone(),
            division_features: self.division_features.clone(),
            size_filter,
            parallel: self.parallel,
        })
    }
}

pub fn load_options(path: &Path) -> Result<ProjectOptions> {
    let contents = fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}
