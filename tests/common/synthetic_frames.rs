use ndarray::{Array2, Array3, ArrayD};
use traxelstore::classifier::{Classifier, ConstantModel, DecisionTree, RandomForest};
use traxelstore::frames::{insert_label_frame, raw_dataset, PathTemplate};
use std::path::Path;
use traxelstore::volume::io::write_external_dataset;
use traxelstore::volume::{Container, ElementType, Group, Node};

/// `(raw, labels)` of one timestep.
pub type Frame = (ArrayD<f32>, ArrayD<u32>);

/// Paint axis-aligned boxes `(label, origin, size)` into a `width × height`
/// frame indexed `[x, y]`. Raw intensity inside a box is `10 * label + x`.
pub fn boxes_frame(width: usize, height: usize, boxes: &[(u32, [usize; 2], [usize; 2])]) -> Frame {
    let mut labels = Array2::<u32>::zeros((width, height));
    let mut raw = Array2::<f32>::zeros((width, height));
    for &(label, [ox, oy], [sx, sy]) in boxes {
        for x in ox..ox + sx {
            for y in oy..oy + sy {
                labels[[x, y]] = label;
                raw[[x, y]] = (10 * label) as f32 + x as f32;
            }
        }
    }
    (raw.into_dyn(), labels.into_dyn())
}

/// Two squares drifting one pixel along x per frame.
pub fn drifting_squares(frames: usize) -> Vec<Frame> {
    (0..frames)
        .map(|t| boxes_frame(24, 20, &[(1, [2 + t, 2], [3, 3]), (2, [12 + t, 10], [4, 4])]))
        .collect()
}

/// One object per entry of `counts`: a horizontal run of that many pixels
/// in its own row.
pub fn sized_objects(counts: &[usize]) -> Frame {
    let width = counts.iter().copied().max().unwrap_or(1);
    let boxes: Vec<(u32, [usize; 2], [usize; 2])> = counts
        .iter()
        .enumerate()
        .map(|(k, &count)| (k as u32 + 1, [0, 2 * k], [count, 1]))
        .collect();
    boxes_frame(width, 2 * counts.len(), &boxes)
}

/// Two cubes in an `8 × 8 × 4` volume.
pub fn cubes_frame() -> Frame {
    let mut labels = Array3::<u32>::zeros((8, 8, 4));
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                labels[[x, y, z]] = 1;
                labels[[x + 5, y + 5, z + 2]] = 2;
            }
        }
    }
    let raw = labels.mapv(|v| v as f32 * 3.0);
    (raw.into_dyn(), labels.into_dyn())
}

/// Classifier whose single sub-model returns `probabilities` for every
/// object.
pub fn constant_classifier(selected: &[&str], width: usize, probabilities: &[f64]) -> Classifier {
    Classifier::new(
        vec![Box::new(ConstantModel::new(width, probabilities.to_vec()))],
        selected.iter().map(|s| s.to_string()).collect(),
    )
    .unwrap()
}

/// Two-class stump on feature 0: values up to `threshold` vote class 0.
pub fn threshold_forest(threshold: f32) -> RandomForest {
    let tree = DecisionTree::new(
        vec![0, -1, -1],
        vec![threshold, 0.0, 0.0],
        vec![1, 0, 0],
        vec![2, 0, 0],
        ndarray::array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        1,
    )
    .unwrap();
    RandomForest::new(1, 2, vec![tree]).unwrap()
}

/// Store `forests` and the selected `(category, feature)` names below
/// `classifier_path`.
pub fn store_classifier(
    container: &mut Container,
    classifier_path: &str,
    forests: &[RandomForest],
    selected: &[(&str, &str)],
) {
    for (i, forest) in forests.iter().enumerate() {
        forest
            .store(
                container,
                &format!("{classifier_path}/ClassifierForests/Forest{i:04}"),
            )
            .unwrap();
    }
    for (category, name) in selected {
        container
            .insert(
                &format!("{classifier_path}/SelectedFeatures/{category}/{name}"),
                Node::Group(Group::new()),
            )
            .unwrap();
    }
}

/// Project container with every label frame at its templated path.
pub fn label_container(frames: &[Frame]) -> Container {
    let template = PathTemplate::default();
    let mut container = Container::new();
    for (t, (_, labels)) in frames.iter().enumerate() {
        insert_label_frame(&mut container, &template, t, labels).unwrap();
    }
    container
}

/// Raw container holding all frames stacked at `path`.
pub fn raw_container(frames: &[Frame], path: &str) -> Container {
    let raws: Vec<ArrayD<f32>> = frames.iter().map(|(raw, _)| raw.clone()).collect();
    let mut container = Container::new();
    container
        .insert_dataset(path, raw_dataset(&raws).unwrap())
        .unwrap();
    container
}

/// Like `label_container`, but each frame's values live in a `u32` sidecar
/// file `labels_{t}.bin` under `dir`.
pub fn external_label_container(dir: &Path, frames: &[Frame]) -> Container {
    let template = PathTemplate::default();
    let mut container = Container::new().with_base_dir(dir);
    for (t, (_, labels)) in frames.iter().enumerate() {
        let mut shape = [1usize; 3];
        for (dst, &src) in shape.iter_mut().zip(labels.shape()) {
            *dst = src;
        }
        let dataset = write_external_dataset(
            dir,
            &format!("labels_{t}.bin"),
            ElementType::U32,
            vec![1, shape[0], shape[1], shape[2], 1],
            labels.iter().map(|&v| v as f64),
        )
        .unwrap();
        container
            .insert_dataset(&template.render(t, shape), dataset)
            .unwrap();
    }
    container
}

/// Like `raw_container`, with the stacked frames in the `f32` sidecar file
/// `raw.bin` under `dir`.
pub fn external_raw_container(dir: &Path, frames: &[Frame], path: &str) -> Container {
    let mut shape = vec![frames.len()];
    shape.extend_from_slice(frames[0].0.shape());
    let values = frames.iter().flat_map(|(raw, _)| raw.iter().map(|&v| v as f64));
    let dataset = write_external_dataset(dir, "raw.bin", ElementType::F32, shape, values).unwrap();
    let mut container = Container::new().with_base_dir(dir);
    container.insert_dataset(path, dataset).unwrap();
    container
}
