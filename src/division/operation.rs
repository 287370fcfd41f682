use crate::error::{PipelineError, Result};
use std::fmt;
use std::str::FromStr;

/// Base feature standing for the squared center distances between a parent
/// and its two candidate children.
pub const SQUARED_DISTANCES: &str = "SquaredDistances";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DivisionOperation {
    /// The parent's own value.
    ParentIdentity,
    /// Squared euclidean distance between the parent's value and each child's.
    SquaredDistances,
    /// Smaller over larger child value, per component.
    ChildrenRatio,
    /// Angle in degrees between the parent→child vectors.
    ParentChildrenAngle,
    /// Parent value over the sum of both children, per component.
    ParentChildrenRatio,
}

impl DivisionOperation {
    pub const ALL: [DivisionOperation; 5] = [
        Self::ParentIdentity,
        Self::SquaredDistances,
        Self::ChildrenRatio,
        Self::ParentChildrenAngle,
        Self::ParentChildrenRatio,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParentIdentity => "ParentIdentity",
            Self::SquaredDistances => "SquaredDistances",
            Self::ChildrenRatio => "ChildrenRatio",
            Self::ParentChildrenAngle => "ParentChildrenAngle",
            Self::ParentChildrenRatio => "ParentChildrenRatio",
        }
    }
}

impl fmt::Display for DivisionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured division feature, `<operation>_<base feature>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DivisionFeature {
    pub operation: DivisionOperation,
    pub base: String,
}

impl DivisionFeature {
    pub fn name(&self) -> String {
        format!("{}_{}", self.operation, self.base)
    }
}

impl FromStr for DivisionFeature {
    type Err = PipelineError;

    fn from_str(name: &str) -> Result<Self> {
        let Some((op, base)) = name.split_once('_') else {
            return Err(PipelineError::configuration(format!(
                "division feature '{name}' is not of the form <operation>_<feature>"
            )));
        };
        let operation = DivisionOperation::ALL
            .into_iter()
            .find(|o| o.as_str() == op)
            .ok_or_else(|| {
                PipelineError::configuration(format!(
                    "unknown division operation '{op}' in '{name}'"
                ))
            })?;
        if base.is_empty() {
            return Err(PipelineError::configuration(format!(
                "division feature '{name}' names no base feature"
            )));
        }
        if base == SQUARED_DISTANCES && operation != DivisionOperation::ChildrenRatio {
            return Err(PipelineError::configuration(format!(
                "'{SQUARED_DISTANCES}' is only defined per child, '{name}' needs a parent value"
            )));
        }
        Ok(Self {
            operation,
            base: base.to_string(),
        })
    }
}
