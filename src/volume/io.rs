//! I/O helpers for containers, 2-D image frames and JSON.
//!
//! - `read_container` / `write_container`: load or store a JSON container.
//! - `write_external_dataset` / `read_elements`: little-endian sidecar files
//!   holding dataset values outside the container document.
//! - `load_label_image` / `load_raw_image`: read a grayscale PNG/TIFF as an
//!   `(x, y)`-indexed array without rescaling the stored values.
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::container::{Container, Dataset, ElementType};
use crate::error::{PipelineError, Result};
use image::DynamicImage;
use ndarray::{Array2, ArrayD};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Read a container document. External dataset files resolve against the
/// directory holding `path`; their values are not loaded here.
pub fn read_container(path: &Path) -> Result<Container> {
    let data = fs::read_to_string(path).map_err(io_error(path))?;
    let container: Container =
        serde_json::from_str(&data).map_err(|source| PipelineError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match path.parent() {
        Some(dir) => container.with_base_dir(dir),
        None => container,
    })
}

pub fn write_container(path: &Path, container: &Container) -> Result<()> {
    write_json_file(path, container)
}

/// Read `len` elements starting at element `offset` of a sidecar file.
pub fn read_elements(
    path: &Path,
    dtype: ElementType,
    offset: usize,
    len: usize,
) -> Result<Vec<f64>> {
    let file = File::open(path).map_err(io_error(path))?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start((offset * dtype.size()) as u64))
        .map_err(io_error(path))?;
    let mut bytes = vec![0u8; len * dtype.size()];
    reader.read_exact(&mut bytes).map_err(io_error(path))?;
    Ok(dtype.decode(&bytes))
}

/// Write `values` as a sidecar file `dir/file` and return the dataset
/// entry referring to it by its relative name.
pub fn write_external_dataset(
    dir: &Path,
    file: &str,
    dtype: ElementType,
    shape: Vec<usize>,
    values: impl IntoIterator<Item = f64>,
) -> Result<Dataset> {
    let expected: usize = shape.iter().product();
    let mut bytes = Vec::with_capacity(expected * dtype.size());
    let mut count = 0;
    for value in values {
        dtype.encode(value, &mut bytes);
        count += 1;
    }
    if count != expected {
        return Err(PipelineError::shape_mismatch(
            format!("external dataset '{file}'"),
            vec![expected],
            vec![count],
        ));
    }
    let path = dir.join(file);
    ensure_parent_dir(&path)?;
    fs::write(&path, bytes).map_err(io_error(&path))?;
    Ok(Dataset::external(shape, file, dtype))
}

/// Integer pixel values of a single-channel image, indexed `[x, y]`.
fn gray_values(img: DynamicImage) -> Array2<u32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    match img {
        DynamicImage::ImageLuma8(buf) => {
            Array2::from_shape_fn((w, h), |(x, y)| buf.get_pixel(x as u32, y as u32)[0] as u32)
        }
        other => {
            let buf = other.into_luma16();
            Array2::from_shape_fn((w, h), |(x, y)| buf.get_pixel(x as u32, y as u32)[0] as u32)
        }
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| PipelineError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a label frame; 8- and 16-bit grayscale labels are kept verbatim.
pub fn load_label_image(path: &Path) -> Result<ArrayD<u32>> {
    Ok(gray_values(open_image(path)?).into_dyn())
}

/// Load a raw intensity frame as `f32` without normalization.
pub fn load_raw_image(path: &Path) -> Result<ArrayD<f32>> {
    Ok(gray_values(open_image(path)?).mapv(|v| v as f32).into_dyn())
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_error(path))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }
    Ok(())
}
