use super::{check_timestep, check_volume_shape, FrameAccessor};
use crate::error::{PipelineError, Result};
use crate::volume::io::{load_label_image, load_raw_image};
use ndarray::ArrayD;
use std::ops::Range;
use std::path::PathBuf;

const TIME_PLACEHOLDER: &str = "{t}";

/// 2-D frames stored as one grayscale image file per timestep.
///
/// Patterns contain a `{t}` placeholder, e.g. `raw/frame_{t}.png`. The shape
/// of the run is taken from the first label image.
pub struct ImageSequenceFrames {
    raw_pattern: String,
    label_pattern: String,
    shape: Vec<usize>,
    frames: usize,
}

impl ImageSequenceFrames {
    pub fn new(
        raw_pattern: impl Into<String>,
        label_pattern: impl Into<String>,
        frames: usize,
    ) -> Result<Self> {
        let raw_pattern = raw_pattern.into();
        let label_pattern = label_pattern.into();
        for pattern in [&raw_pattern, &label_pattern] {
            if !pattern.contains(TIME_PLACEHOLDER) {
                return Err(PipelineError::configuration(format!(
                    "image pattern '{pattern}' lacks a {TIME_PLACEHOLDER} placeholder"
                )));
            }
        }
        if frames == 0 {
            return Err(PipelineError::configuration("image sequence has no frames"));
        }
        let first = load_label_image(&Self::path(&label_pattern, 0))?;
        Ok(Self {
            raw_pattern,
            label_pattern,
            shape: first.shape().to_vec(),
            frames,
        })
    }

    fn path(pattern: &str, timestep: usize) -> PathBuf {
        PathBuf::from(pattern.replace(TIME_PLACEHOLDER, &timestep.to_string()))
    }
}

impl FrameAccessor for ImageSequenceFrames {
    fn time_range(&self) -> Range<usize> {
        0..self.frames
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn label_image(&self, timestep: usize) -> Result<ArrayD<u32>> {
        check_timestep(&self.time_range(), timestep)?;
        let labels = load_label_image(&Self::path(&self.label_pattern, timestep))?;
        check_volume_shape(&format!("label image of frame {timestep}"), &self.shape, &labels)?;
        Ok(labels)
    }

    fn raw_image(&self, timestep: usize) -> Result<ArrayD<f32>> {
        check_timestep(&self.time_range(), timestep)?;
        let raw = load_raw_image(&Self::path(&self.raw_pattern, timestep))?;
        check_volume_shape(&format!("raw image of frame {timestep}"), &self.shape, &raw)?;
        Ok(raw)
    }
}
