mod common;

use common::init_logging;
use common::synthetic_frames::{
    drifting_squares, external_label_container, external_raw_container, label_container,
    raw_container, store_classifier, threshold_forest, Frame,
};
use image::GrayImage;
use std::path::Path;
use tempfile::TempDir;
use traxelstore::config::load_options;
use traxelstore::features::COUNT;
use traxelstore::prelude::*;
use traxelstore::frames::PathTemplate;
use traxelstore::volume::io::{read_container, write_container, write_json_file};
use traxelstore::volume::Dataset;
use traxelstore::{open_project, ImageSequenceFrames, PipelineError, PipelineStage, ProjectOptions};

const RAW_PATH: &str = "/volume/data";

/// Write project and raw containers for `frames` into `dir`. The project
/// holds a two-forest count classifier on `Count` and a division classifier
/// on `ChildrenRatio_Count`.
fn write_project(dir: &Path, frames: &[Frame]) -> ProjectOptions {
    let mut project = label_container(frames);
    store_classifier(
        &mut project,
        "/CountClassification",
        &[threshold_forest(10.0), threshold_forest(10.0)],
        &[("Standard Object Features", COUNT)],
    );
    store_classifier(
        &mut project,
        "/DivisionDetection",
        &[threshold_forest(0.5)],
        &[("Division Features", "ChildrenRatio_Count")],
    );
    let project_file = dir.join("tracking.json");
    let raw_file = dir.join("raw.json");
    write_container(&project_file, &project).unwrap();
    write_container(&raw_file, &raw_container(frames, RAW_PATH)).unwrap();
    ProjectOptions {
        project_file,
        raw_image_file: raw_file,
        raw_image_path: RAW_PATH.to_string(),
        ..ProjectOptions::default()
    }
}

#[test]
fn project_containers_fill_the_store() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let frames = drifting_squares(3);
    let options = write_project(dir.path(), &frames);

    let mut pipeline = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    assert_eq!(pipeline.frames().time_range(), 0..3);
    assert_eq!(pipeline.classifiers().count.as_ref().unwrap().num_models(), 2);
    let store = pipeline.fill_traxel_store().unwrap();
    assert_eq!(store.len(), 6);

    // 9 pixels vote class 0 in both forests, 16 pixels class 1.
    let small = store.get(0, 1).unwrap();
    let large = store.get(0, 2).unwrap();
    assert_eq!(small.feature("detProb").unwrap(), &[2.0, 0.0]);
    assert_eq!(large.feature("detProb").unwrap(), &[0.0, 2.0]);
    let div = small.feature("divProb").unwrap();
    assert!((div.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    assert!(!store.get(2, 1).unwrap().has_feature("divProb"));
    assert_eq!(pipeline.stage(), PipelineStage::Assembled);
}

#[test]
fn container_frames_match_in_memory_frames() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let frames = drifting_squares(3);
    let mut options = write_project(dir.path(), &frames);
    options.object_count_classifier_path = None;
    options.division_classifier_path = None;

    let mut from_project = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    from_project.fill_traxel_store().unwrap();

    let mut in_memory = Traxelstore::new(
        InMemoryFrames::new(frames).unwrap(),
        PluginRegistry::with_default_plugins(),
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    in_memory.fill_traxel_store().unwrap();
    assert_eq!(from_project.store(), in_memory.store());
}

#[test]
fn time_range_restricts_frames() {
    let dir = TempDir::new().unwrap();
    let mut options = write_project(dir.path(), &drifting_squares(4));
    options.time_range = Some([1, 3]);
    let mut pipeline = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    let store = pipeline.fill_traxel_store().unwrap();
    assert_eq!(store.timesteps(), vec![1, 2]);
    assert!(store.get(1, 1).unwrap().has_feature("divProb"));
    assert!(!store.get(2, 1).unwrap().has_feature("divProb"));
}

#[test]
fn options_file_drives_the_run() {
    let dir = TempDir::new().unwrap();
    let mut options = write_project(dir.path(), &drifting_squares(2));
    options.size_filter = Some([10.0, 100.0]);
    let path = dir.path().join("options.json");
    write_json_file(&path, &options).unwrap();

    let loaded = load_options(&path).unwrap();
    assert_eq!(loaded, options);
    let mut pipeline = open_project(&loaded, PluginRegistry::with_default_plugins()).unwrap();
    let store = pipeline.fill_traxel_store().unwrap();
    let ids: Vec<(usize, u32)> = store.iter().map(|t| (t.timestep, t.id)).collect();
    assert_eq!(ids, vec![(0, 2), (1, 2)]);
}

#[test]
fn missing_inputs_are_configuration_errors() {
    let dir = TempDir::new().unwrap();
    let options = write_project(dir.path(), &drifting_squares(2));

    let missing_file = ProjectOptions {
        raw_image_file: dir.path().join("absent.json"),
        ..options.clone()
    };
    assert!(matches!(
        open_project(&missing_file, PluginRegistry::with_default_plugins()),
        Err(PipelineError::Configuration { .. })
    ));

    let missing_classifier = ProjectOptions {
        transition_classifier_path: Some("/TransitionClassification".into()),
        ..options.clone()
    };
    assert!(matches!(
        open_project(&missing_classifier, PluginRegistry::with_default_plugins()),
        Err(PipelineError::Configuration { .. })
    ));

    let missing_raw = ProjectOptions {
        raw_image_path: "/volume/other".into(),
        ..options
    };
    assert!(matches!(
        open_project(&missing_raw, PluginRegistry::with_default_plugins()),
        Err(PipelineError::Configuration { .. })
    ));
}

#[test]
fn external_volumes_are_read_per_frame() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let frames = drifting_squares(3);
    let project_file = dir.path().join("tracking.json");
    let raw_file = dir.path().join("raw.json");
    write_container(&project_file, &external_label_container(dir.path(), &frames)).unwrap();
    write_container(
        &raw_file,
        &external_raw_container(dir.path(), &frames, RAW_PATH),
    )
    .unwrap();
    let options = ProjectOptions {
        project_file: project_file.clone(),
        raw_image_file: raw_file,
        raw_image_path: RAW_PATH.to_string(),
        object_count_classifier_path: None,
        division_classifier_path: None,
        ..ProjectOptions::default()
    };

    let loaded = read_container(&project_file).unwrap();
    let first = loaded
        .dataset(&PathTemplate::default().render(0, [24, 20, 1]))
        .unwrap();
    assert!(first.data.is_empty());
    assert_eq!(first.shape, vec![1, 24, 20, 1, 1]);

    let mut from_files = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    from_files.fill_traxel_store().unwrap();
    let mut in_memory = Traxelstore::new(
        InMemoryFrames::new(frames).unwrap(),
        PluginRegistry::with_default_plugins(),
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    in_memory.fill_traxel_store().unwrap();
    assert_eq!(from_files.store(), in_memory.store());

    // Opening touches no volume data; the missing frame only fails when read.
    std::fs::remove_file(dir.path().join("labels_2.bin")).unwrap();
    let pipeline = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    assert_eq!(pipeline.frames().label_image(1).unwrap().shape(), &[24, 20]);
    assert!(matches!(
        pipeline.frames().label_image(2),
        Err(PipelineError::Io { .. })
    ));
}

#[test]
fn label_frame_with_other_shape_is_rejected() {
    let dir = TempDir::new().unwrap();
    let frames = drifting_squares(3);
    let mut options = write_project(dir.path(), &frames);
    options.object_count_classifier_path = None;
    options.division_classifier_path = None;

    let mut project = read_container(&options.project_file).unwrap();
    let path = PathTemplate::default().render(1, [24, 20, 1]);
    project
        .insert_dataset(&path, Dataset::new(vec![1, 20, 20, 1, 1], vec![0.0; 400]))
        .unwrap();
    write_container(&options.project_file, &project).unwrap();

    let mut pipeline = open_project(&options, PluginRegistry::with_default_plugins()).unwrap();
    assert_eq!(pipeline.frames().shape(), &[24, 20, 1]);
    assert!(pipeline.frames().label_image(0).is_ok());
    assert!(matches!(
        pipeline.frames().label_image(1),
        Err(PipelineError::ShapeMismatch { .. })
    ));
    assert!(pipeline.fill_traxel_store().is_err());
}

fn write_png(path: &Path, values: &ndarray::ArrayD<impl Copy + Into<f64>>) {
    let (w, h) = (values.shape()[0], values.shape()[1]);
    let img = GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v: f64 = values[&[x as usize, y as usize][..]].into();
        image::Luma([v as u8])
    });
    img.save(path).unwrap();
}

#[test]
fn png_sequence_matches_in_memory_frames() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let frames = drifting_squares(3);
    for (t, (raw, labels)) in frames.iter().enumerate() {
        write_png(&dir.path().join(format!("raw_{t}.png")), raw);
        write_png(&dir.path().join(format!("labels_{t}.png")), labels);
    }
    let pattern = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
    let sequence =
        ImageSequenceFrames::new(pattern("raw_{t}.png"), pattern("labels_{t}.png"), 3).unwrap();
    assert_eq!(sequence.shape(), &[24, 20]);

    let mut from_images = Traxelstore::new(
        sequence,
        PluginRegistry::with_default_plugins(),
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    from_images.fill_traxel_store().unwrap();

    let mut in_memory = Traxelstore::new(
        InMemoryFrames::new(frames).unwrap(),
        PluginRegistry::with_default_plugins(),
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    in_memory.fill_traxel_store().unwrap();
    assert_eq!(from_images.store(), in_memory.store());
}
