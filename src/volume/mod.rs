//! Volume storage: the JSON group/dataset container, image-file I/O and
//! shape helpers shared by the frame accessors.
pub mod container;
pub mod io;

pub use self::container::{Container, Dataset, ElementType, ExternalData, Group, Node};

use ndarray::{ArrayD, Axis};

/// Drop every axis of extent 1.
pub fn squeeze<T>(mut array: ArrayD<T>) -> ArrayD<T> {
    while let Some(axis) = array.shape().iter().position(|&d| d == 1) {
        array = array.index_axis_move(Axis(axis), 0);
    }
    array
}

/// Number of axes with more than one element.
pub fn count_dimensions(shape: &[usize]) -> usize {
    shape.iter().filter(|&&d| d != 1).count()
}
