//! Random forest sub-model stored as container datasets.
//!
//! Layout of one forest group:
//!
//! ```text
//! ForestNNNN/
//!   feature_count   scalar
//!   class_count     scalar
//!   trees/
//!     TreeNNNN/
//!       feature     [nodes]            split feature, -1 marks a leaf
//!       threshold   [nodes]            go left when x[feature] <= threshold
//!       left        [nodes]            child index, greater than the node index
//!       right       [nodes]
//!       values      [nodes, classes]   class weights, read at leaves
//! ```
use super::ProbabilisticModel;
use crate::error::{PipelineError, Result};
use crate::volume::{Container, Dataset, Group, Node};
use ndarray::{Array2, ArrayView1, ArrayView2};

#[derive(Clone, Debug, PartialEq)]
pub struct DecisionTree {
    feature: Vec<i64>,
    threshold: Vec<f32>,
    left: Vec<usize>,
    right: Vec<usize>,
    /// Normalized class distribution per node.
    values: Array2<f64>,
}

impl DecisionTree {
    /// Build a tree from flat node arrays, validating the topology.
    pub fn new(
        feature: Vec<i64>,
        threshold: Vec<f32>,
        left: Vec<usize>,
        right: Vec<usize>,
        values: Array2<f64>,
        feature_count: usize,
    ) -> Result<Self> {
        let nodes = feature.len();
        if nodes == 0 {
            return Err(PipelineError::configuration("decision tree without nodes"));
        }
        for (name, len) in [
            ("threshold", threshold.len()),
            ("left", left.len()),
            ("right", right.len()),
            ("values", values.nrows()),
        ] {
            if len != nodes {
                return Err(PipelineError::shape_mismatch(
                    format!("decision tree '{name}'"),
                    vec![nodes],
                    vec![len],
                ));
            }
        }
        for node in 0..nodes {
            if feature[node] < 0 {
                continue;
            }
            if feature[node] as usize >= feature_count {
                return Err(PipelineError::configuration(format!(
                    "tree node {node} splits on feature {} of {feature_count}",
                    feature[node]
                )));
            }
            for child in [left[node], right[node]] {
                if child <= node || child >= nodes {
                    return Err(PipelineError::configuration(format!(
                        "tree node {node} has invalid child {child}"
                    )));
                }
            }
        }
        let mut values = values;
        for mut row in values.rows_mut() {
            let total: f64 = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
        Ok(Self {
            feature,
            threshold,
            left,
            right,
            values,
        })
    }

    pub fn class_count(&self) -> usize {
        self.values.ncols()
    }

    fn leaf(&self, sample: ArrayView1<'_, f32>) -> usize {
        let mut node = 0;
        while self.feature[node] >= 0 {
            let f = self.feature[node] as usize;
            node = if sample[f] <= self.threshold[node] {
                self.left[node]
            } else {
                self.right[node]
            };
        }
        node
    }

    fn to_group(&self) -> Group {
        let n = self.feature.len();
        let mut group = Group::new();
        let vector = |data: Vec<f64>| {
            Node::Dataset(Dataset::new(vec![n], data))
        };
        group.insert(
            "feature".into(),
            vector(self.feature.iter().map(|&v| v as f64).collect()),
        );
        group.insert(
            "threshold".into(),
            vector(self.threshold.iter().map(|&v| v as f64).collect()),
        );
        group.insert(
            "left".into(),
            vector(self.left.iter().map(|&v| v as f64).collect()),
        );
        group.insert(
            "right".into(),
            vector(self.right.iter().map(|&v| v as f64).collect()),
        );
        group.insert(
            "values".into(),
            Node::Dataset(Dataset::from_array(self.values.view().into_dyn())),
        );
        group
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RandomForest {
    feature_count: usize,
    class_count: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(feature_count: usize, class_count: usize, trees: Vec<DecisionTree>) -> Result<Self> {
        if trees.is_empty() {
            return Err(PipelineError::configuration("random forest without trees"));
        }
        if let Some(tree) = trees.iter().find(|t| t.class_count() != class_count) {
            return Err(PipelineError::shape_mismatch(
                "tree class count",
                vec![class_count],
                vec![tree.class_count()],
            ));
        }
        Ok(Self {
            feature_count,
            class_count,
            trees,
        })
    }

    /// Read a forest from the group at `path`.
    pub fn load(container: &Container, path: &str) -> Result<Self> {
        let scalar = |name: &str| -> Result<usize> {
            let values = container.read(&format!("{path}/{name}"))?;
            let value = if values.ndim() == 0 {
                values.iter().next().copied()
            } else {
                None
            };
            value
                .filter(|v| *v >= 0.0 && v.fract() == 0.0)
                .map(|v| v as usize)
                .ok_or_else(|| {
                    PipelineError::configuration(format!("'{path}/{name}' is not a count"))
                })
        };
        let feature_count = scalar("feature_count")?;
        let class_count = scalar("class_count")?;
        let trees_path = format!("{path}/trees");
        let mut trees = Vec::new();
        for name in container.group(&trees_path)?.keys() {
            let tree_path = format!("{trees_path}/{name}");
            let vector = |field: &str| -> Result<Vec<f64>> {
                Ok(container
                    .read(&format!("{tree_path}/{field}"))?
                    .iter()
                    .copied()
                    .collect())
            };
            let index = |v: f64| -> Result<usize> {
                if v >= 0.0 && v.fract() == 0.0 {
                    Ok(v as usize)
                } else {
                    Err(PipelineError::configuration(format!(
                        "'{tree_path}' holds child index {v}"
                    )))
                }
            };
            let feature: Vec<i64> = vector("feature")?.into_iter().map(|v| v as i64).collect();
            let threshold: Vec<f32> = vector("threshold")?.into_iter().map(|v| v as f32).collect();
            let left = vector("left")?
                .into_iter()
                .map(index)
                .collect::<Result<Vec<_>>>()?;
            let right = vector("right")?
                .into_iter()
                .map(index)
                .collect::<Result<Vec<_>>>()?;
            let values = container
                .read(&format!("{tree_path}/values"))?
                .into_dimensionality::<ndarray::Ix2>()
                .map_err(|e| {
                    PipelineError::configuration(format!("'{tree_path}/values' must be 2-D: {e}"))
                })?;
            trees.push(DecisionTree::new(
                feature,
                threshold,
                left,
                right,
                values,
                feature_count,
            )?);
        }
        Self::new(feature_count, class_count, trees)
    }

    /// Write this forest as a group at `path`.
    pub fn store(&self, container: &mut Container, path: &str) -> Result<()> {
        let mut trees = Group::new();
        for (i, tree) in self.trees.iter().enumerate() {
            trees.insert(format!("Tree{i:04}"), Node::Group(tree.to_group()));
        }
        let mut group = Group::new();
        group.insert(
            "feature_count".into(),
            Node::Dataset(Dataset::scalar(self.feature_count as f64)),
        );
        group.insert(
            "class_count".into(),
            Node::Dataset(Dataset::scalar(self.class_count as f64)),
        );
        group.insert("trees".into(), Node::Group(trees));
        container.insert(path, Node::Group(group))
    }
}

impl ProbabilisticModel for RandomForest {
    fn feature_count(&self) -> usize {
        self.feature_count
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    /// Average of the leaf distributions over all trees.
    fn predict_probabilities(&self, features: ArrayView2<'_, f32>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((features.nrows(), self.class_count));
        let weight = 1.0 / self.trees.len() as f64;
        for (sample, mut row) in features.rows().into_iter().zip(out.rows_mut()) {
            for tree in &self.trees {
                let leaf = tree.leaf(sample);
                row.scaled_add(weight, &tree.values.row(leaf));
            }
        }
        out
    }
}
