//! Parent/children features for frame pairs `(t, t + 1)`.
//!
//! Each object of frame `t` is paired with its two nearest objects in frame
//! `t + 1` (by `RegionCenter`) and every configured `<operation>_<base>`
//! feature is evaluated on the triple.
pub mod operation;

pub use operation::{DivisionFeature, DivisionOperation, SQUARED_DISTANCES};

use crate::error::{PipelineError, Result};
use crate::features::{FeatureArray, FeatureMapping, REGION_CENTER};
use log::{debug, warn};
use nalgebra::DVector;
use ndarray::{Array2, ArrayD, ArrayView1};
use std::collections::BTreeSet;

pub const DEFAULT_DIVISION_FEATURES: [&str; 6] = [
    "ParentChildrenRatio_Count",
    "ParentChildrenRatio_Mean",
    "ChildrenRatio_Count",
    "ChildrenRatio_Mean",
    "ParentChildrenAngle_RegionCenter",
    "ChildrenRatio_SquaredDistances",
];

#[derive(Clone, Debug, PartialEq)]
pub struct DivisionFeatureEngine {
    features: Vec<DivisionFeature>,
}

impl Default for DivisionFeatureEngine {
    fn default() -> Self {
        use DivisionOperation::*;
        let feature = |operation, base: &str| DivisionFeature {
            operation,
            base: base.to_string(),
        };
        Self {
            features: vec![
                feature(ParentChildrenRatio, "Count"),
                feature(ParentChildrenRatio, "Mean"),
                feature(ChildrenRatio, "Count"),
                feature(ChildrenRatio, "Mean"),
                feature(ParentChildrenAngle, REGION_CENTER),
                feature(ChildrenRatio, SQUARED_DISTANCES),
            ],
        }
    }
}

fn parse_features<S: AsRef<str>>(names: &[S]) -> Result<Vec<DivisionFeature>> {
    let mut seen = BTreeSet::new();
    let mut features = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        if !seen.insert(name.to_string()) {
            return Err(PipelineError::configuration(format!(
                "division feature '{name}' listed twice"
            )));
        }
        features.push(name.parse()?);
    }
    Ok(features)
}

/// Two nearest candidates in frame `t + 1`, ordered by distance then label.
fn nearest_children(
    center: ArrayView1<'_, f64>,
    candidates: &[u32],
    child_centers: &Array2<f64>,
) -> Option<[usize; 2]> {
    let mut ranked: Vec<(f64, u32)> = candidates
        .iter()
        .map(|&label| {
            let d = center
                .iter()
                .zip(child_centers.row(label as usize))
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>();
            (d, label)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    match ranked.as_slice() {
        [(_, a), (_, b), ..] => Some([*a as usize, *b as usize]),
        _ => None,
    }
}

fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        a / b
    }
}

fn children_ratio(c1: &DVector<f64>, c2: &DVector<f64>) -> Vec<f64> {
    c1.iter()
        .zip(c2.iter())
        .map(|(&a, &b)| ratio(a.min(b), a.max(b)))
        .collect()
}

fn evaluate(
    operation: DivisionOperation,
    parent: &DVector<f64>,
    c1: &DVector<f64>,
    c2: &DVector<f64>,
) -> Vec<f64> {
    match operation {
        DivisionOperation::ParentIdentity => parent.iter().copied().collect(),
        DivisionOperation::SquaredDistances => {
            vec![(parent - c1).norm_squared(), (parent - c2).norm_squared()]
        }
        DivisionOperation::ChildrenRatio => children_ratio(c1, c2),
        DivisionOperation::ParentChildrenAngle => {
            let (v1, v2) = (c1 - parent, c2 - parent);
            if v1.norm() == 0.0 || v2.norm() == 0.0 {
                vec![0.0]
            } else {
                vec![v1.angle(&v2).to_degrees()]
            }
        }
        DivisionOperation::ParentChildrenRatio => parent
            .iter()
            .zip(c1.iter().zip(c2.iter()))
            .map(|(&p, (&a, &b))| ratio(p, a + b))
            .collect(),
    }
}

fn output_width(operation: DivisionOperation, dim: usize) -> usize {
    match operation {
        DivisionOperation::SquaredDistances => 2,
        DivisionOperation::ParentChildrenAngle => 1,
        _ => dim,
    }
}

fn vector(row: ArrayView1<'_, f64>) -> DVector<f64> {
    DVector::from_iterator(row.len(), row.iter().copied())
}

impl DivisionFeatureEngine {
    pub fn with_features<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        Ok(Self {
            features: parse_features(names)?,
        })
    }

    /// Replace the configured features. Invalid names leave the current
    /// configuration untouched.
    pub fn set_division_features<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.features = parse_features(names)?;
        Ok(())
    }

    pub fn features(&self) -> &[DivisionFeature] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(DivisionFeature::name).collect()
    }

    /// Division features of every object of frame `frame`.
    ///
    /// `children` and `child_labels` describe frame `frame + 1`; the label
    /// image decides which objects exist there. The result has one row per
    /// object of `parents`, background row and unmatched parents are zero.
    pub fn compute(
        &self,
        frame: usize,
        parents: &FeatureMapping,
        children: &FeatureMapping,
        child_labels: &ArrayD<u32>,
    ) -> Result<FeatureMapping> {
        let present: BTreeSet<u32> = child_labels.iter().copied().filter(|&l| l != 0).collect();
        let expected = present.last().map_or(1, |&max| max as usize + 1);
        if children.num_objects() != expected {
            return Err(PipelineError::shape_mismatch(
                format!("objects of frame {} vs its label image", frame + 1),
                vec![expected],
                vec![children.num_objects()],
            ));
        }
        let candidates: Vec<u32> = present.into_iter().collect();

        let parent_centers = parents
            .dense(REGION_CENTER)
            .map_err(|e| e.in_frame(frame))?;
        let child_centers = children
            .dense(REGION_CENTER)
            .map_err(|e| e.in_frame(frame + 1))?;
        if parent_centers.ncols() != child_centers.ncols() {
            return Err(PipelineError::shape_mismatch(
                format!("{REGION_CENTER} of frames {frame} and {}", frame + 1),
                vec![parent_centers.ncols()],
                vec![child_centers.ncols()],
            ));
        }

        let n = parents.num_objects();
        if candidates.len() < 2 && n > 1 {
            warn!(
                "frame {}: {} object(s) in frame {}, division features are zero",
                frame,
                candidates.len(),
                frame + 1
            );
        }
        let pairs: Vec<Option<[usize; 2]>> = (0..n)
            .map(|obj| {
                if obj == 0 {
                    None
                } else {
                    nearest_children(parent_centers.row(obj), &candidates, child_centers)
                }
            })
            .collect();

        let mut out = FeatureMapping::with_objects(n);
        for feature in &self.features {
            let name = feature.name();
            let values = if feature.base == SQUARED_DISTANCES {
                let mut values = Array2::<f64>::zeros((n, 1));
                for (obj, pair) in pairs.iter().enumerate() {
                    if let Some([a, b]) = *pair {
                        let p = vector(parent_centers.row(obj));
                        let d = evaluate(
                            DivisionOperation::SquaredDistances,
                            &p,
                            &vector(child_centers.row(a)),
                            &vector(child_centers.row(b)),
                        );
                        let ratios = children_ratio(
                            &DVector::from_element(1, d[0]),
                            &DVector::from_element(1, d[1]),
                        );
                        values[[obj, 0]] = ratios[0];
                    }
                }
                values
            } else {
                let p = parents
                    .dense(&feature.base)
                    .map_err(|e| e.in_frame(frame))?;
                let c = children
                    .dense(&feature.base)
                    .map_err(|e| e.in_frame(frame + 1))?;
                if p.ncols() != c.ncols() {
                    return Err(PipelineError::shape_mismatch(
                        format!("'{}' of frames {frame} and {}", feature.base, frame + 1),
                        vec![p.ncols()],
                        vec![c.ncols()],
                    ));
                }
                let mut values =
                    Array2::<f64>::zeros((n, output_width(feature.operation, p.ncols())));
                for (obj, pair) in pairs.iter().enumerate() {
                    if let Some([a, b]) = *pair {
                        let row = evaluate(
                            feature.operation,
                            &vector(p.row(obj)),
                            &vector(c.row(a)),
                            &vector(c.row(b)),
                        );
                        for (dst, v) in values.row_mut(obj).iter_mut().zip(row) {
                            *dst = v;
                        }
                    }
                }
                values
            };
            out.insert(name, FeatureArray::Dense(values))?;
        }
        debug!(
            "frame {}: {} division features for {} objects",
            frame,
            out.len(),
            n.saturating_sub(1)
        );
        Ok(out)
    }
}
