//! Hierarchical container of groups and n-d numeric datasets.
//!
//! Mirrors the layout of an HDF5 project file: groups are addressed by
//! `/`-separated paths, leaves are datasets with an explicit shape and
//! row-major data. Serialized as JSON; groups are plain objects and datasets
//! are objects keyed `shape` plus either inline `data` or an `external`
//! binary file. External values stay on disk and are read per slab, so a
//! loaded container holds only metadata for its volumes.
use super::io::read_elements;
use crate::error::{PipelineError, Result};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A group's children, ordered by name.
pub type Group = BTreeMap<String, Node>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Dataset(Dataset),
    Group(Group),
}

/// Little-endian element encoding of an external dataset file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl ElementType {
    /// Bytes per element.
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub(crate) fn decode(self, bytes: &[u8]) -> Vec<f64> {
        let chunks = bytes.chunks_exact(self.size());
        match self {
            Self::U8 => bytes.iter().map(|&b| b as f64).collect(),
            Self::U16 => chunks
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as f64)
                .collect(),
            Self::U32 => chunks
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            Self::F32 => chunks
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect(),
            Self::F64 => chunks
                .map(|c| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(c);
                    f64::from_le_bytes(b)
                })
                .collect(),
        }
    }

    pub(crate) fn encode(self, value: f64, out: &mut Vec<u8>) {
        match self {
            Self::U8 => out.push(value as u8),
            Self::U16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            Self::U32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            Self::F32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
            Self::F64 => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Location of dataset values outside the container document. Relative
/// files resolve against the directory of the container file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalData {
    pub file: PathBuf,
    pub dtype: ElementType,
}

/// Dense n-d numeric array in row-major order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub shape: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalData>,
}

impl Dataset {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self {
            shape,
            data,
            external: None,
        }
    }

    pub fn scalar(value: f64) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    /// Dataset whose values live in `file`.
    pub fn external(shape: Vec<usize>, file: impl Into<PathBuf>, dtype: ElementType) -> Self {
        Self {
            shape,
            data: Vec::new(),
            external: Some(ExternalData {
                file: file.into(),
                dtype,
            }),
        }
    }

    /// Copy an array view into a dataset, converting elements to `f64`.
    pub fn from_array<T>(array: ArrayViewD<'_, T>) -> Self
    where
        T: Copy + Into<f64>,
    {
        Self::new(
            array.shape().to_vec(),
            array.iter().map(|&v| v.into()).collect(),
        )
    }

    /// Number of elements implied by the shape.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize an inline dataset as an `f64` array, validating the
    /// element count. External datasets are read through their container.
    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        if self.external.is_some() {
            return Err(PipelineError::configuration(
                "external dataset must be read through its container",
            ));
        }
        if self.len() != self.data.len() {
            return Err(PipelineError::shape_mismatch(
                "dataset element count",
                vec![self.len()],
                vec![self.data.len()],
            ));
        }
        shaped(&self.shape, self.data.clone())
    }
}

fn shaped(shape: &[usize], values: Vec<f64>) -> Result<ArrayD<f64>> {
    ArrayD::from_shape_vec(IxDyn(shape), values).map_err(|e| {
        PipelineError::configuration(format!("invalid dataset layout {shape:?}: {e}"))
    })
}

/// Root of a container document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container {
    root: Group,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

fn components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory against which relative external files resolve.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Look up the node at `path`; the root itself is not a node.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut parts = components(path);
        let mut node = self.root.get(parts.next()?)?;
        for part in parts {
            match node {
                Node::Group(children) => node = children.get(part)?,
                Node::Dataset(_) => return None,
            }
        }
        Some(node)
    }

    pub fn contains(&self, path: &str) -> bool {
        components(path).next().is_none() || self.get(path).is_some()
    }

    /// Children of the group at `path` (`/` or `""` addresses the root).
    pub fn group(&self, path: &str) -> Result<&Group> {
        if components(path).next().is_none() {
            return Ok(&self.root);
        }
        match self.get(path) {
            Some(Node::Group(children)) => Ok(children),
            Some(Node::Dataset(_)) => Err(PipelineError::configuration(format!(
                "'{path}' is a dataset, expected a group"
            ))),
            None => Err(PipelineError::not_found(format!("group '{path}'"))),
        }
    }

    /// Metadata of the dataset at `path`.
    pub fn dataset(&self, path: &str) -> Result<&Dataset> {
        match self.get(path) {
            Some(Node::Dataset(ds)) => Ok(ds),
            Some(Node::Group(_)) => Err(PipelineError::configuration(format!(
                "'{path}' is a group, expected a dataset"
            ))),
            None => Err(PipelineError::not_found(format!("dataset '{path}'"))),
        }
    }

    fn external_file(&self, external: &ExternalData) -> PathBuf {
        match &self.base_dir {
            Some(dir) if external.file.is_relative() => dir.join(&external.file),
            _ => external.file.clone(),
        }
    }

    /// All values of the dataset at `path`.
    pub fn read(&self, path: &str) -> Result<ArrayD<f64>> {
        let ds = self.dataset(path)?;
        match &ds.external {
            None => ds.to_array(),
            Some(external) => {
                let file = self.external_file(external);
                shaped(&ds.shape, read_elements(&file, external.dtype, 0, ds.len())?)
            }
        }
    }

    /// Entry `index` along the leading axis of the dataset at `path`. Only
    /// that entry is read from an external file.
    pub fn read_slab(&self, path: &str, index: usize) -> Result<ArrayD<f64>> {
        let ds = self.dataset(path)?;
        let Some((&entries, slab_shape)) = ds.shape.split_first() else {
            return Err(PipelineError::configuration(format!(
                "scalar dataset '{path}' has no leading axis"
            )));
        };
        if index >= entries {
            return Err(PipelineError::not_found(format!(
                "entry {index} of '{path}' with {entries} entries"
            )));
        }
        let len: usize = slab_shape.iter().product();
        let start = index * len;
        let values = match &ds.external {
            Some(external) => {
                read_elements(&self.external_file(external), external.dtype, start, len)?
            }
            None => ds
                .data
                .get(start..start + len)
                .ok_or_else(|| {
                    PipelineError::shape_mismatch(
                        format!("dataset '{path}'"),
                        vec![ds.len()],
                        vec![ds.data.len()],
                    )
                })?
                .to_vec(),
        };
        shaped(slab_shape, values)
    }

    /// Insert a node, creating intermediate groups. Replaces an existing
    /// node at the same path.
    pub fn insert(&mut self, path: &str, node: Node) -> Result<()> {
        let parts: Vec<&str> = components(path).collect();
        let Some((leaf, parents)) = parts.split_last() else {
            return Err(PipelineError::configuration("cannot insert at the root"));
        };
        let mut group = &mut self.root;
        for part in parents {
            let entry = group
                .entry((*part).to_string())
                .or_insert_with(|| Node::Group(Group::new()));
            group = match entry {
                Node::Group(children) => children,
                Node::Dataset(_) => {
                    return Err(PipelineError::configuration(format!(
                        "'{part}' in '{path}' is a dataset, cannot descend"
                    )))
                }
            };
        }
        group.insert((*leaf).to_string(), node);
        Ok(())
    }

    pub fn insert_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        self.insert(path, Node::Dataset(dataset))
    }
}
