use super::{FeatureArray, FeatureMapping, FeaturePlugin};
use crate::error::Result;
use ndarray::{ArrayD, Ix2};

/// Feature name of the per-object boundary outline.
pub const POLYGON: &str = "Polygon";

/// Boundary pixels of every 2-D object as a variable-length list
/// `[x0, y0, x1, y1, ...]` in raster order. A pixel lies on the boundary when
/// one of its 4-neighbours carries another label or lies outside the image.
pub struct BoundaryPolygon;

impl FeaturePlugin for BoundaryPolygon {
    fn name(&self) -> &str {
        "boundary_polygon"
    }

    fn supported_dimensions(&self) -> &[usize] {
        &[2]
    }

    fn compute(
        &self,
        _raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        _frame: usize,
    ) -> Result<FeatureMapping> {
        let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
        let mut outlines: Vec<Vec<f64>> = vec![Vec::new(); max_label + 1];
        let mut out = FeatureMapping::with_objects(max_label + 1);
        let Ok(labels) = labels.view().into_dimensionality::<Ix2>() else {
            out.insert(POLYGON, FeatureArray::List(outlines))?;
            return Ok(out);
        };
        let (w, h) = labels.dim();
        for ((x, y), &label) in labels.indexed_iter() {
            if label == 0 {
                continue;
            }
            let on_boundary = x == 0
                || y == 0
                || x + 1 == w
                || y + 1 == h
                || labels[[x - 1, y]] != label
                || labels[[x + 1, y]] != label
                || labels[[x, y - 1]] != label
                || labels[[x, y + 1]] != label;
            if on_boundary {
                let outline = &mut outlines[label as usize];
                outline.push(x as f64);
                outline.push(y as f64);
            }
        }
        out.insert(POLYGON, FeatureArray::List(outlines))?;
        Ok(out)
    }
}
