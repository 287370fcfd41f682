//! Standard region features computed for every label of a frame.
//!
//! Per object: `Count`, `Sum`, `Mean`, `Variance`, `Minimum`, `Maximum`,
//! `RegionCenter`, `Coord<Minimum>`, `Coord<Maximum>` (bounding box) and
//! `RegionRadii`. The frame-global extrema and the intensity histogram are
//! produced as well but declared omitted, so the registry strips them.
use super::accumulator::RegionAccumulator;
use super::{FeatureArray, FeatureMapping, FeaturePlugin};
use crate::error::{PipelineError, Result};
use ndarray::{Array2, ArrayD, Dimension, Zip};

pub const GLOBAL_MINIMUM: &str = "Global<Minimum >";
pub const GLOBAL_MAXIMUM: &str = "Global<Maximum >";
pub const HISTOGRAM: &str = "Histogram";

const OMITTED: [&str; 4] = [
    GLOBAL_MAXIMUM,
    GLOBAL_MINIMUM,
    HISTOGRAM,
    "Weighted<RegionCenter>",
];

pub struct StandardObjectFeatures {
    histogram_bins: usize,
}

impl Default for StandardObjectFeatures {
    fn default() -> Self {
        Self { histogram_bins: 16 }
    }
}

fn scalar(regions: &[RegionAccumulator], f: impl Fn(&RegionAccumulator) -> f64) -> FeatureArray {
    FeatureArray::scalar(regions.iter().map(f).collect())
}

fn rows(values: impl Iterator<Item = Vec<f64>>, width: usize) -> Array2<f64> {
    let data: Vec<Vec<f64>> = values.collect();
    Array2::from_shape_fn((data.len(), width), |(i, j)| data[i][j])
}

impl FeaturePlugin for StandardObjectFeatures {
    fn name(&self) -> &str {
        "standard_object_features"
    }

    fn supported_dimensions(&self) -> &[usize] {
        &[2, 3]
    }

    fn omitted_features(&self) -> &[&str] {
        &OMITTED
    }

    fn compute(
        &self,
        raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        frame: usize,
    ) -> Result<FeatureMapping> {
        if raw.shape() != labels.shape() {
            return Err(PipelineError::shape_mismatch(
                format!("raw vs label volume of frame {frame}"),
                labels.shape().to_vec(),
                raw.shape().to_vec(),
            ));
        }
        let ndim = labels.ndim();
        let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
        let mut regions = vec![RegionAccumulator::new(ndim); max_label + 1];
        let mut global_min = f64::INFINITY;
        let mut global_max = f64::NEG_INFINITY;

        for ((idx, &label), &value) in labels.indexed_iter().zip(raw.iter()) {
            let value = value as f64;
            global_min = global_min.min(value);
            global_max = global_max.max(value);
            if label != 0 {
                regions[label as usize].push(idx.slice(), value);
            }
        }

        let n = regions.len();
        let mut out = FeatureMapping::with_objects(n);
        out.insert("Count", scalar(&regions, |r| r.count as f64))?;
        out.insert("Sum", scalar(&regions, |r| r.sum))?;
        out.insert("Mean", scalar(&regions, RegionAccumulator::mean))?;
        out.insert("Variance", scalar(&regions, RegionAccumulator::variance))?;
        out.insert(
            "Minimum",
            scalar(&regions, |r| if r.is_empty() { 0.0 } else { r.min }),
        )?;
        out.insert(
            "Maximum",
            scalar(&regions, |r| if r.is_empty() { 0.0 } else { r.max }),
        )?;
        out.insert(
            "RegionCenter",
            FeatureArray::Dense(rows(regions.iter().map(|r| r.center()), ndim)),
        )?;
        out.insert(
            "Coord<Minimum>",
            FeatureArray::Dense(rows(
                regions.iter().map(|r| r.bounds_or_zero(&r.coord_min)),
                ndim,
            )),
        )?;
        out.insert(
            "Coord<Maximum>",
            FeatureArray::Dense(rows(
                regions.iter().map(|r| r.bounds_or_zero(&r.coord_max)),
                ndim,
            )),
        )?;
        out.insert(
            "RegionRadii",
            FeatureArray::Dense(rows(regions.iter().map(|r| r.radii()), ndim)),
        )?;

        if global_min > global_max {
            global_min = 0.0;
            global_max = 0.0;
        }
        out.insert(GLOBAL_MINIMUM, FeatureArray::scalar(vec![global_min; n]))?;
        out.insert(GLOBAL_MAXIMUM, FeatureArray::scalar(vec![global_max; n]))?;
        out.insert(
            HISTOGRAM,
            FeatureArray::Dense(self.histograms(raw, labels, n, global_min, global_max)),
        )?;
        Ok(out)
    }
}

impl StandardObjectFeatures {
    fn histograms(
        &self,
        raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        objects: usize,
        lo: f64,
        hi: f64,
    ) -> Array2<f64> {
        let bins = self.histogram_bins.max(1);
        let mut hist = Array2::<f64>::zeros((objects, bins));
        let span = (hi - lo).max(f64::EPSILON);
        Zip::from(labels).and(raw).for_each(|&label, &value| {
            if label != 0 {
                let pos = ((value as f64 - lo) / span * bins as f64) as usize;
                hist[[label as usize, pos.min(bins - 1)]] += 1.0;
            }
        });
        hist
    }
}
