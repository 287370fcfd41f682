//! Per-frame feature mapping: feature name → one row (or list entry) per
//! object, with row 0 reserved for the background.
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use std::collections::BTreeMap;

/// Values of one feature for every object of a frame.
///
/// The schema is declared by the producer: `Dense` features have the same
/// width for all objects, `List` features hold a variable-length vector per
/// object.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureArray {
    /// `num_objects × dim` matrix; scalar features have one column.
    Dense(Array2<f64>),
    /// One vector per object, indexed by object id.
    List(Vec<Vec<f64>>),
}

impl FeatureArray {
    /// One value per object, stored as a single column.
    pub fn scalar(values: Vec<f64>) -> Self {
        Self::Dense(Array1::from(values).insert_axis(Axis(1)))
    }

    pub fn num_objects(&self) -> usize {
        match self {
            Self::Dense(m) => m.nrows(),
            Self::List(l) => l.len(),
        }
    }

    /// Column count for dense features, `None` for lists.
    pub fn dim(&self) -> Option<usize> {
        match self {
            Self::Dense(m) => Some(m.ncols()),
            Self::List(_) => None,
        }
    }

    pub fn as_dense(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Dense(m) => Some(m),
            Self::List(_) => None,
        }
    }

    /// Flattened values of one object, or `None` if the id is out of range.
    pub fn object_values(&self, object: usize) -> Option<Vec<f64>> {
        match self {
            Self::Dense(m) if object < m.nrows() => Some(m.row(object).to_vec()),
            Self::List(l) => l.get(object).cloned(),
            Self::Dense(_) => None,
        }
    }
}

/// Feature name → per-object array for one frame. All arrays share the same
/// number of objects; the first insert fixes it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMapping {
    num_objects: Option<usize>,
    features: BTreeMap<String, FeatureArray>,
}

impl FeatureMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping whose object count is fixed up front.
    pub fn with_objects(num_objects: usize) -> Self {
        Self {
            num_objects: Some(num_objects),
            features: BTreeMap::new(),
        }
    }

    /// Objects per feature, background included.
    pub fn num_objects(&self) -> usize {
        self.num_objects.unwrap_or(0)
    }

    /// Insert or replace a feature, checking its object count.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        array: FeatureArray,
    ) -> Result<Option<FeatureArray>> {
        let name = name.into();
        let rows = array.num_objects();
        match self.num_objects {
            Some(n) if n != rows => {
                return Err(PipelineError::shape_mismatch(
                    format!("object count of feature '{name}'"),
                    vec![n],
                    vec![rows],
                ))
            }
            Some(_) => {}
            None => self.num_objects = Some(rows),
        }
        Ok(self.features.insert(name, array))
    }

    pub fn get(&self, name: &str) -> Option<&FeatureArray> {
        self.features.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FeatureArray> {
        self.features.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureArray)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Dense matrix of a feature; `MissingFeature` if absent.
    pub fn dense(&self, name: &str) -> Result<&Array2<f64>> {
        match self.features.get(name) {
            Some(FeatureArray::Dense(m)) => Ok(m),
            Some(FeatureArray::List(_)) => Err(PipelineError::configuration(format!(
                "feature '{name}' is list-typed, a dense array is required"
            ))),
            None => Err(PipelineError::missing_feature(name)),
        }
    }

    /// Flattened values of `name` for `object`, with explicit bounds checks.
    pub fn object_values(&self, name: &str, object: usize) -> Result<Vec<f64>> {
        let array = self
            .features
            .get(name)
            .ok_or_else(|| PipelineError::missing_feature(name))?;
        array.object_values(object).ok_or_else(|| {
            PipelineError::shape_mismatch(
                format!("rows of feature '{name}'"),
                vec![object + 1],
                vec![array.num_objects()],
            )
        })
    }

    /// Add every feature of `other`. Existing names are a configuration
    /// error, object counts must agree.
    pub fn extend_disjoint(&mut self, other: FeatureMapping) -> Result<()> {
        for (name, array) in other.features {
            if self.features.contains_key(&name) {
                return Err(PipelineError::configuration(format!(
                    "feature '{name}' already present in mapping"
                )));
            }
            self.insert(name, array)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn insert_enforces_common_object_count() {
        let mut m = FeatureMapping::new();
        m.insert("Count", FeatureArray::scalar(vec![0.0, 3.0, 4.0]))
            .unwrap();
        let err = m
            .insert("Mean", FeatureArray::Dense(array![[0.0], [1.0]]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch { .. }));
        assert_eq!(m.num_objects(), 3);
    }

    #[test]
    fn list_and_dense_values_are_indexed_by_object() {
        let mut m = FeatureMapping::new();
        m.insert(
            "RegionCenter",
            FeatureArray::Dense(array![[0.0, 0.0], [1.5, 2.5]]),
        )
        .unwrap();
        m.insert("Polygon", FeatureArray::List(vec![vec![], vec![1.0, 2.0, 3.0, 4.0]]))
            .unwrap();
        assert_eq!(m.object_values("RegionCenter", 1).unwrap(), vec![1.5, 2.5]);
        assert_eq!(m.object_values("Polygon", 1).unwrap().len(), 4);
        assert!(matches!(
            m.object_values("RegionCenter", 2),
            Err(PipelineError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            m.object_values("Count", 1),
            Err(PipelineError::MissingFeature { .. })
        ));
        assert!(m.dense("Polygon").is_err());
    }
}
