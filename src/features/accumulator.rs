use nalgebra::DMatrix;

/// Running statistics of one labeled region: intensity moments, coordinate
/// moments and the bounding box.
#[derive(Clone, Debug)]
pub(crate) struct RegionAccumulator {
    pub count: usize,
    pub sum: f64,
    pub sum_sq: f64,
    pub min: f64,
    pub max: f64,
    pub coord_sum: Vec<f64>,
    /// Row-major `ndim × ndim` sum of coordinate outer products.
    pub coord_outer: Vec<f64>,
    pub coord_min: Vec<f64>,
    pub coord_max: Vec<f64>,
}

impl RegionAccumulator {
    pub(crate) fn new(ndim: usize) -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            coord_sum: vec![0.0; ndim],
            coord_outer: vec![0.0; ndim * ndim],
            coord_min: vec![f64::INFINITY; ndim],
            coord_max: vec![f64::NEG_INFINITY; ndim],
        }
    }

    pub(crate) fn push(&mut self, coord: &[usize], value: f64) {
        let ndim = self.coord_sum.len();
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        for i in 0..ndim {
            let ci = coord[i] as f64;
            self.coord_sum[i] += ci;
            self.coord_min[i] = self.coord_min[i].min(ci);
            self.coord_max[i] = self.coord_max[i].max(ci);
            for j in 0..ndim {
                self.coord_outer[i * ndim + j] += ci * coord[j] as f64;
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn mean(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Population variance of the intensities.
    pub(crate) fn variance(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
    }

    pub(crate) fn center(&self) -> Vec<f64> {
        if self.is_empty() {
            return vec![0.0; self.coord_sum.len()];
        }
        let n = self.count as f64;
        self.coord_sum.iter().map(|s| s / n).collect()
    }

    pub(crate) fn bounds_or_zero(&self, values: &[f64]) -> Vec<f64> {
        if self.is_empty() {
            vec![0.0; values.len()]
        } else {
            values.to_vec()
        }
    }

    /// Square roots of the coordinate covariance eigenvalues, largest first.
    pub(crate) fn radii(&self) -> Vec<f64> {
        let ndim = self.coord_sum.len();
        if self.is_empty() {
            return vec![0.0; ndim];
        }
        let n = self.count as f64;
        let center = self.center();
        let cov = DMatrix::from_fn(ndim, ndim, |i, j| {
            self.coord_outer[i * ndim + j] / n - center[i] * center[j]
        });
        let mut radii: Vec<f64> = cov
            .symmetric_eigen()
            .eigenvalues
            .iter()
            .map(|ev| ev.max(0.0).sqrt())
            .collect();
        radii.sort_by(|a, b| b.total_cmp(a));
        radii
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moments_of_a_line_segment() {
        let mut acc = RegionAccumulator::new(2);
        for x in 0..5usize {
            acc.push(&[x, 2], x as f64);
        }
        assert_eq!(acc.count, 5);
        assert_eq!(acc.center(), vec![2.0, 2.0]);
        assert!((acc.mean() - 2.0).abs() < 1e-12);
        assert!((acc.variance() - 2.0).abs() < 1e-12);
        let radii = acc.radii();
        assert!((radii[0] - 2.0f64.sqrt()).abs() < 1e-9);
        assert!(radii[1].abs() < 1e-9);
        assert_eq!(acc.coord_min, vec![0.0, 2.0]);
        assert_eq!(acc.coord_max, vec![4.0, 2.0]);
    }
}
