use super::{check_timestep, check_volume_shape, FrameAccessor, PathTemplate};
use crate::error::{PipelineError, Result};
use crate::volume::{squeeze, Container, Dataset, Node};
use log::debug;
use ndarray::{ArrayD, Axis};
use std::ops::Range;
use std::sync::Arc;

/// Frames stored in containers: labels at a templated path, one dataset per
/// frame shaped `[1, x, y, z, 1]`; raw data as one dataset shaped
/// `[t, x, y, z, ...]` whose leading axis is time.
pub struct ContainerFrames {
    labels: Arc<Container>,
    raw: Arc<Container>,
    label_template: PathTemplate,
    raw_path: String,
    shape: [usize; 3],
    time_range: Range<usize>,
}

impl ContainerFrames {
    /// Derive shape and time range from the label group: the group holding
    /// the templated datasets has one child per frame, and the shape is axes
    /// `1..4` of its first dataset.
    pub fn open(
        labels: Arc<Container>,
        raw: Arc<Container>,
        label_template: PathTemplate,
        raw_path: impl Into<String>,
    ) -> Result<Self> {
        let raw_path = raw_path.into();
        let group = labels
            .group(label_template.parent())
            .map_err(PipelineError::required)?;
        let first = group.values().find_map(|node| match node {
            Node::Dataset(ds) => Some(ds),
            Node::Group(_) => None,
        });
        let Some(first) = first else {
            return Err(PipelineError::configuration(format!(
                "label group '{}' holds no datasets",
                label_template.parent()
            )));
        };
        if first.shape.len() < 4 {
            return Err(PipelineError::shape_mismatch(
                "label dataset rank",
                vec![5],
                vec![first.shape.len()],
            ));
        }
        let shape = [first.shape[1], first.shape[2], first.shape[3]];
        let frames = group.len();
        raw.dataset(&raw_path).map_err(PipelineError::required)?;
        debug!(
            "ContainerFrames::open frames={} shape={:?} template={}",
            frames,
            shape,
            label_template.as_str()
        );
        Ok(Self {
            labels,
            raw,
            label_template,
            raw_path,
            shape,
            time_range: 0..frames,
        })
    }

    /// Restrict processing to a sub-range of the stored frames.
    pub fn with_time_range(mut self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.time_range.end {
            return Err(PipelineError::configuration(format!(
                "time range {}..{} exceeds stored frames 0..{}",
                range.start, range.end, self.time_range.end
            )));
        }
        self.time_range = range;
        Ok(self)
    }
}

fn to_labels(values: ArrayD<f64>) -> Result<ArrayD<u32>> {
    if let Some(bad) = values
        .iter()
        .find(|&&v| v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64)
    {
        return Err(PipelineError::configuration(format!(
            "label value {bad} is not a valid object id"
        )));
    }
    Ok(values.mapv(|v| v as u32))
}

impl FrameAccessor for ContainerFrames {
    fn time_range(&self) -> Range<usize> {
        self.time_range.clone()
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn label_image(&self, timestep: usize) -> Result<ArrayD<u32>> {
        check_timestep(&self.time_range, timestep)?;
        let path = self.label_template.render(timestep, self.shape);
        let dataset = self.labels.dataset(&path)?;
        if dataset.shape.len() < 4 || dataset.shape[1..4] != self.shape {
            return Err(PipelineError::shape_mismatch(
                format!("label volume of frame {timestep}"),
                self.shape.to_vec(),
                dataset.shape.clone(),
            ));
        }
        let mut volume = self.labels.read(&path)?.index_axis_move(Axis(0), 0);
        if volume.ndim() > 3 {
            let last = volume.ndim() - 1;
            volume = volume.index_axis_move(Axis(last), 0);
        }
        let labels = squeeze(to_labels(volume)?);
        check_volume_shape(&format!("label volume of frame {timestep}"), &self.shape, &labels)?;
        Ok(labels)
    }

    fn raw_image(&self, timestep: usize) -> Result<ArrayD<f32>> {
        check_timestep(&self.time_range, timestep)?;
        let volume = self
            .raw
            .read_slab(&self.raw_path, timestep)?
            .mapv(|v| v as f32);
        let raw = squeeze(volume);
        check_volume_shape(&format!("raw volume of frame {timestep}"), &self.shape, &raw)?;
        Ok(raw)
    }
}

/// Write one label frame at its templated location, shaped `[1, x, y, z, 1]`.
pub fn insert_label_frame(
    container: &mut Container,
    template: &PathTemplate,
    timestep: usize,
    labels: &ArrayD<u32>,
) -> Result<()> {
    let mut shape = [1usize; 3];
    for (dst, &src) in shape.iter_mut().zip(labels.shape()) {
        *dst = src;
    }
    let data: Vec<f64> = labels.iter().map(|&v| v as f64).collect();
    let dataset = Dataset::new(vec![1, shape[0], shape[1], shape[2], 1], data);
    container.insert_dataset(&template.render(timestep, shape), dataset)
}

/// Stack equally shaped raw frames into one dataset with a leading time axis.
pub fn raw_dataset(frames: &[ArrayD<f32>]) -> Result<Dataset> {
    let Some(first) = frames.first() else {
        return Err(PipelineError::configuration("no raw frames to stack"));
    };
    let mut shape = vec![frames.len()];
    shape.extend_from_slice(first.shape());
    let mut data = Vec::with_capacity(shape.iter().product());
    for (t, frame) in frames.iter().enumerate() {
        if frame.shape() != first.shape() {
            return Err(PipelineError::shape_mismatch(
                format!("raw frame {t}"),
                first.shape().to_vec(),
                frame.shape().to_vec(),
            ));
        }
        data.extend(frame.iter().map(|&v| v as f64));
    }
    Ok(Dataset::new(shape, data))
}
