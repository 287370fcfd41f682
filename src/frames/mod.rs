//! Frame access: raw and label volumes addressed by zero-based timestep.
//!
//! All accessors share the same contract: a fixed time range and a fixed
//! per-run shape. Requests outside of the range fail with `NotFound`, volumes
//! whose shape disagrees with the run shape fail with `ShapeMismatch`.
//! Volumes are returned with singleton axes squeezed, so a 2-D dataset stored
//! as `x × y × 1` arrives as a 2-D array. Background label is 0.
mod container;
mod memory;
mod sequence;
mod template;

pub use container::{insert_label_frame, raw_dataset, ContainerFrames};
pub use memory::InMemoryFrames;
pub use sequence::ImageSequenceFrames;
pub use template::{PathTemplate, DEFAULT_LABEL_IMAGE_PATH};

use crate::error::{PipelineError, Result};
use crate::volume::count_dimensions;
use ndarray::ArrayD;
use std::ops::Range;

pub trait FrameAccessor: Send + Sync {
    /// Timesteps this accessor serves, `start..end`.
    fn time_range(&self) -> Range<usize>;

    /// Spatial shape of every frame in the run, before squeezing.
    fn shape(&self) -> &[usize];

    fn label_image(&self, timestep: usize) -> Result<ArrayD<u32>>;

    fn raw_image(&self, timestep: usize) -> Result<ArrayD<f32>>;

    /// Number of axes with more than one element (2 or 3).
    fn num_dimensions(&self) -> usize {
        count_dimensions(self.shape())
    }
}

/// Fail with `NotFound` when `timestep` is outside `range`.
pub(crate) fn check_timestep(range: &Range<usize>, timestep: usize) -> Result<()> {
    if range.contains(&timestep) {
        Ok(())
    } else {
        Err(PipelineError::not_found(format!(
            "timestep {timestep} outside of range {}..{}",
            range.start, range.end
        )))
    }
}

/// Compare a squeezed volume against the run shape with singletons removed.
pub(crate) fn check_volume_shape<T>(
    context: &str,
    run_shape: &[usize],
    volume: &ArrayD<T>,
) -> Result<()> {
    let expected: Vec<usize> = run_shape.iter().copied().filter(|&d| d != 1).collect();
    if volume.shape() == expected.as_slice() {
        Ok(())
    } else {
        Err(PipelineError::shape_mismatch(
            context,
            expected,
            volume.shape().to_vec(),
        ))
    }
}
