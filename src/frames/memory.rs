use super::{check_timestep, check_volume_shape, FrameAccessor};
use crate::error::{PipelineError, Result};
use crate::volume::squeeze;
use ndarray::ArrayD;
use std::ops::Range;

/// Frames held in memory, one `(raw, labels)` pair per timestep starting at 0.
#[derive(Clone, Debug)]
pub struct InMemoryFrames {
    frames: Vec<(ArrayD<f32>, ArrayD<u32>)>,
    shape: Vec<usize>,
}

impl InMemoryFrames {
    /// All frames must share the shape of the first label volume. Singleton
    /// axes are squeezed on the way in.
    pub fn new(frames: Vec<(ArrayD<f32>, ArrayD<u32>)>) -> Result<Self> {
        let Some((_, first)) = frames.first() else {
            return Err(PipelineError::configuration("no frames supplied"));
        };
        let shape = first.shape().to_vec();
        let frames: Vec<_> = frames
            .into_iter()
            .map(|(raw, labels)| (squeeze(raw), squeeze(labels)))
            .collect();
        for (t, (raw, labels)) in frames.iter().enumerate() {
            check_volume_shape(&format!("label volume of frame {t}"), &shape, labels)?;
            check_volume_shape(&format!("raw volume of frame {t}"), &shape, raw)?;
        }
        Ok(Self { frames, shape })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameAccessor for InMemoryFrames {
    fn time_range(&self) -> Range<usize> {
        0..self.frames.len()
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn label_image(&self, timestep: usize) -> Result<ArrayD<u32>> {
        check_timestep(&self.time_range(), timestep)?;
        Ok(self.frames[timestep].1.clone())
    }

    fn raw_image(&self, timestep: usize) -> Result<ArrayD<f32>> {
        check_timestep(&self.time_range(), timestep)?;
        Ok(self.frames[timestep].0.clone())
    }
}
