use crate::error::{PipelineError, Result};

/// Default location of the per-frame label volumes inside a project file.
pub const DEFAULT_LABEL_IMAGE_PATH: &str =
    "/TrackingFeatureExtraction/LabelImage/0000/[[%d, 0, 0, 0, 0], [%d, %d, %d, %d, 1]]";

const PLACEHOLDER: &str = "%d";
const PLACEHOLDER_COUNT: usize = 5;

/// Path with five positional `%d` placeholders, filled with
/// `(t, t + 1, shape_x, shape_y, shape_z)`.
///
/// Rendering is purely textual so existing stored layouts are addressed
/// byte-for-byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
}

impl PathTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        let count = template.matches(PLACEHOLDER).count();
        if count != PLACEHOLDER_COUNT {
            return Err(PipelineError::configuration(format!(
                "label image path '{template}' has {count} placeholders, expected {PLACEHOLDER_COUNT}"
            )));
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Group holding one dataset per frame: everything before the last `/`.
    pub fn parent(&self) -> &str {
        match self.template.rfind('/') {
            Some(idx) => &self.template[..idx],
            None => "",
        }
    }

    pub fn render(&self, timestep: usize, shape: [usize; 3]) -> String {
        let values = [timestep, timestep + 1, shape[0], shape[1], shape[2]];
        let mut out = String::with_capacity(self.template.len() + 16);
        let mut rest = self.template.as_str();
        for value in values {
            match rest.find(PLACEHOLDER) {
                Some(idx) => {
                    out.push_str(&rest[..idx]);
                    out.push_str(&value.to_string());
                    rest = &rest[idx + PLACEHOLDER.len()..];
                }
                None => break,
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_LABEL_IMAGE_PATH.to_string(),
        }
    }
}
