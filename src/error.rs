//! Error types for the traxel store pipeline.
//!
//! Every failure is fatal for the run: errors propagate to the caller with
//! enough context (frame, object, feature) to locate the offending input.
//! The size filter is not an error and never produces one.

use crate::pipeline::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading frames, computing features, classifying
/// objects or assembling the store.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required file, container path or group is missing, or the loaded
    /// configuration is inconsistent.
    #[error("configuration: {message}")]
    Configuration { message: String },

    /// A timestep or dataset outside of what the source provides.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Array or volume dimensions disagree with the established shape.
    #[error("shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// Two feature plugins emitted the same feature name for one frame.
    #[error("feature '{feature}' of frame {frame} produced by both '{first}' and '{second}'")]
    FeatureCollision {
        feature: String,
        frame: usize,
        first: String,
        second: String,
    },

    /// Classifier input width differs from the trained feature count.
    #[error("classifier expects {expected} feature columns, input has {found}")]
    FeatureCountMismatch { expected: usize, found: usize },

    /// A required or selected feature is absent from a mapping.
    #[error("missing feature '{feature}'{}", describe_location(.frame, .object))]
    MissingFeature {
        feature: String,
        frame: Option<usize>,
        object: Option<u32>,
    },

    /// An operation was invoked in the wrong pipeline stage.
    #[error("'{operation}' is not allowed in stage {stage:?}")]
    Usage {
        operation: &'static str,
        stage: PipelineStage,
    },

    /// Failure while extracting or storing one feature of one object.
    #[error("frame {frame}, object {object}, feature '{feature}'")]
    ObjectFeature {
        frame: usize,
        object: u32,
        feature: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// Failure while evaluating one classifier on the objects of a frame.
    #[error("{classifier} classifier, frame {frame}")]
    ClassifierInput {
        classifier: String,
        frame: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("failed to access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON {}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode image {}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn describe_location(frame: &Option<usize>, object: &Option<u32>) -> String {
    match (frame, object) {
        (Some(f), Some(o)) => format!(" (frame {f}, object {o})"),
        (Some(f), None) => format!(" (frame {f})"),
        (None, Some(o)) => format!(" (object {o})"),
        (None, None) => String::new(),
    }
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl Into<Vec<usize>>,
        found: impl Into<Vec<usize>>,
    ) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn missing_feature(feature: impl Into<String>) -> Self {
        Self::MissingFeature {
            feature: feature.into(),
            frame: None,
            object: None,
        }
    }

    /// Attach frame context to a `MissingFeature` error; other kinds pass
    /// through untouched.
    pub fn in_frame(self, frame: usize) -> Self {
        match self {
            Self::MissingFeature {
                feature,
                frame: None,
                object,
            } => Self::MissingFeature {
                feature,
                frame: Some(frame),
                object,
            },
            other => other,
        }
    }

    /// Turn `NotFound` into a configuration error, for inputs the run cannot
    /// start without.
    pub fn required(self) -> Self {
        match self {
            Self::NotFound { what } => Self::Configuration {
                message: format!("required {what} is missing"),
            },
            other => other,
        }
    }

    /// Wrap an error with the classifier and frame it occurred for.
    pub fn for_classifier(self, classifier: impl Into<String>, frame: usize) -> Self {
        Self::ClassifierInput {
            classifier: classifier.into(),
            frame,
            source: Box::new(self.in_frame(frame)),
        }
    }

    /// Wrap an error with the frame/object/feature it occurred for.
    pub fn for_object(self, frame: usize, object: u32, feature: impl Into<String>) -> Self {
        Self::ObjectFeature {
            frame,
            object,
            feature: feature.into(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
