mod common;

use common::init_logging;
use common::synthetic_frames::{
    boxes_frame, constant_classifier, cubes_frame, drifting_squares, sized_objects, Frame,
};
use ndarray::{array, s, Array2, ArrayD};
use traxelstore::classifier::ConstantModel;
use traxelstore::features::{FeatureArray, COM, COUNT, POLYGON, REGION_CENTER};
use traxelstore::prelude::*;
use traxelstore::{
    Classifier, FeatureMapping, FeaturePlugin, PipelineError, SizeFilter, DEFAULT_DIVISION_FEATURES,
};

fn run(
    frames: Vec<Frame>,
    classifiers: ClassifierSet,
    options: PipelineOptions,
) -> Traxelstore<InMemoryFrames> {
    init_logging();
    let frames = InMemoryFrames::new(frames).unwrap();
    let mut pipeline = Traxelstore::new(
        frames,
        PluginRegistry::with_default_plugins(),
        classifiers,
        options,
    )
    .unwrap();
    pipeline.fill_traxel_store().unwrap();
    pipeline
}

fn with_division() -> ClassifierSet {
    ClassifierSet {
        count: Some(constant_classifier(&[COUNT], 1, &[0.1, 0.9])),
        division: Some(constant_classifier(&["ChildrenRatio_Count"], 1, &[0.7, 0.3])),
        transition: None,
    }
}

fn without_division() -> ClassifierSet {
    ClassifierSet {
        count: Some(constant_classifier(&[COUNT], 1, &[0.1, 0.9])),
        ..ClassifierSet::default()
    }
}

#[test]
fn com_length_matches_dimensionality() {
    let p = run(drifting_squares(3), ClassifierSet::default(), PipelineOptions::default());
    assert_eq!(p.store().len(), 6);
    for traxel in p.store().iter() {
        assert_eq!(traxel.feature(COM).unwrap().len(), 2);
        assert_eq!(traxel.z().unwrap(), 0.0);
    }

    let p = run(
        vec![cubes_frame(), cubes_frame()],
        ClassifierSet::default(),
        PipelineOptions::default(),
    );
    assert_eq!(p.num_dimensions(), 3);
    for traxel in p.store().iter() {
        assert_eq!(traxel.feature(COM).unwrap().len(), 3);
    }
    let second = p.store().get(0, 2).unwrap();
    assert_eq!(second.feature(COM).unwrap(), &[5.5, 5.5, 2.5]);
    assert_eq!(second.z().unwrap(), 2.5);
}

#[test]
fn size_filter_drops_objects_outside_bounds() {
    let options = PipelineOptions {
        size_filter: Some(SizeFilter::new(10.0, 100.0).unwrap()),
        ..PipelineOptions::default()
    };
    let p = run(vec![sized_objects(&[5, 50, 500])], ClassifierSet::default(), options);
    let ids: Vec<u32> = p.store().iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2]);
    assert_eq!(p.store().get(0, 2).unwrap().feature(COUNT).unwrap(), &[50.0]);
    assert_eq!(p.report().objects_seen, 3);
    assert_eq!(p.report().objects_rejected_by_size, 2);
    assert_eq!(p.report().traxels_created, 1);
}

#[test]
fn ensemble_probabilities_are_summed() {
    let count = Classifier::new(
        vec![
            Box::new(ConstantModel::new(1, vec![0.3, 0.7])),
            Box::new(ConstantModel::new(1, vec![0.2, 0.8])),
        ],
        vec![COUNT.to_string()],
    )
    .unwrap();
    let p = run(
        drifting_squares(2),
        ClassifierSet {
            count: Some(count),
            ..ClassifierSet::default()
        },
        PipelineOptions::default(),
    );
    for traxel in p.store().iter() {
        let probs = traxel.feature("detProb").unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs[1] - 1.5).abs() < 1e-12);
    }
}

#[test]
fn division_features_are_additive() {
    let plain = run(drifting_squares(4), without_division(), PipelineOptions::default());
    let divided = run(drifting_squares(4), with_division(), PipelineOptions::default());

    let division_names: Vec<String> = DEFAULT_DIVISION_FEATURES
        .iter()
        .map(|s| s.to_string())
        .chain(["divProb".to_string()])
        .collect();

    for t in 0..4 {
        let a = plain.frame_features(t).unwrap();
        let b = divided.frame_features(t).unwrap();
        for (name, array) in a.iter() {
            assert_eq!(b.get(name), Some(array), "frame {t} feature {name}");
        }
    }
    assert_eq!(plain.store().len(), divided.store().len());
    for traxel in plain.store().iter() {
        let other = divided.store().get(traxel.timestep, traxel.id).unwrap();
        for (name, values) in traxel.features() {
            assert_eq!(other.feature(name).unwrap(), values.as_slice());
        }
        for name in other.features().keys() {
            assert!(
                traxel.has_feature(name) || division_names.contains(name),
                "unexpected feature {name}"
            );
        }
    }
}

#[test]
fn last_frame_never_has_division_features() {
    let p = run(drifting_squares(3), with_division(), PipelineOptions::default());
    assert_eq!(p.division_frames().len(), 2);
    assert!(!p.division_frames().contains(&2));
    let last = p.frame_features(2).unwrap();
    for name in DEFAULT_DIVISION_FEATURES {
        assert!(!last.contains(name));
        assert!(p.frame_features(1).unwrap().contains(name));
    }
    for traxel in p.store().frame(2) {
        assert!(!traxel.has_feature("divProb"));
        assert!(!traxel.has_feature("ChildrenRatio_Count"));
    }
    let parent = p.store().get(0, 1).unwrap();
    assert_eq!(parent.feature("divProb").unwrap(), &[0.7, 0.3]);
}

#[test]
fn traxel_features_equal_mapping_rows() {
    let p = run(drifting_squares(2), ClassifierSet::default(), PipelineOptions::default());
    for traxel in p.store().iter() {
        let mapping = p.frame_features(traxel.timestep).unwrap();
        for (name, array) in mapping.iter() {
            let row = array.object_values(traxel.id as usize).unwrap();
            assert_eq!(traxel.feature(name).unwrap(), row.as_slice(), "{name}");
        }
        assert_eq!(
            traxel.feature(COM).unwrap(),
            traxel.feature(REGION_CENTER).unwrap()
        );
        assert!(!traxel.feature(POLYGON).unwrap().is_empty());
    }
    let dict = p.traxel_feature_dict(1, 2).unwrap();
    assert_eq!(
        dict[POLYGON].as_slice(),
        p.store().get(1, 2).unwrap().feature(POLYGON).unwrap()
    );
}

struct Emits(&'static str);

impl FeaturePlugin for Emits {
    fn name(&self) -> &str {
        self.0
    }

    fn supported_dimensions(&self) -> &[usize] {
        &[2]
    }

    fn compute(
        &self,
        _raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        _frame: usize,
    ) -> traxelstore::Result<FeatureMapping> {
        let n = labels.iter().copied().max().unwrap_or(0) as usize + 1;
        let mut m = FeatureMapping::new();
        m.insert("Foo", FeatureArray::scalar(vec![1.0; n]))?;
        Ok(m)
    }
}

#[test]
fn plugins_emitting_the_same_name_collide() {
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(Emits("first")));
    registry.register(Box::new(Emits("second")));
    let frames = InMemoryFrames::new(drifting_squares(1)).unwrap();
    let mut p = Traxelstore::new(
        frames,
        registry,
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    match p.extract_features() {
        Err(PipelineError::FeatureCollision {
            feature,
            first,
            second,
            ..
        }) => {
            assert_eq!(feature, "Foo");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("expected collision, got {other:?}"),
    }
}

/// Per-object features `A` (scalar) and `B` (2-vector): object `k` carries
/// `k - 1` in every column, so two objects give `A = [0, 1]` and
/// `B = [[0, 0], [1, 1]]`.
struct AbFeatures;

impl FeaturePlugin for AbFeatures {
    fn name(&self) -> &str {
        "ab"
    }

    fn supported_dimensions(&self) -> &[usize] {
        &[2]
    }

    fn compute(
        &self,
        _raw: &ArrayD<f32>,
        labels: &ArrayD<u32>,
        _frame: usize,
    ) -> traxelstore::Result<FeatureMapping> {
        let n = labels.iter().copied().max().unwrap_or(0) as usize + 1;
        let values: Vec<f64> = (0..n).map(|k| k.saturating_sub(1) as f64).collect();
        let b = Array2::from_shape_fn((n, 2), |(k, _)| values[k]);
        let mut m = FeatureMapping::new();
        m.insert("A", FeatureArray::scalar(values))?;
        m.insert("B", FeatureArray::Dense(b))?;
        Ok(m)
    }
}

fn two_object_frame() -> Frame {
    boxes_frame(6, 6, &[(1, [0, 0], [2, 2]), (2, [3, 3], [2, 2])])
}

#[test]
fn feature_vector_concatenates_selected_features() {
    let frames: Vec<Frame> = (0..3).map(|_| two_object_frame()).collect();
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(AbFeatures));
    let mut p = Traxelstore::new(
        InMemoryFrames::new(frames).unwrap(),
        registry,
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    p.extract_features().unwrap();
    let classifier = constant_classifier(&["A", "B"], 3, &[0.5, 0.5]);
    for t in 0..3 {
        let x = classifier
            .extract_feature_vector(p.frame_features(t).unwrap())
            .unwrap();
        assert_eq!(x.nrows(), 3);
        assert_eq!(x.slice(s![1.., ..]), array![[0.0f32, 0.0, 0.0], [1.0, 1.0, 1.0]]);
    }
}

#[test]
fn parallel_run_equals_sequential_run() {
    let sequential = run(drifting_squares(5), with_division(), PipelineOptions::default());
    let parallel = run(
        drifting_squares(5),
        with_division(),
        PipelineOptions {
            parallel: true,
            ..PipelineOptions::default()
        },
    );
    assert_eq!(sequential.store(), parallel.store());
    assert_eq!(sequential.division_frames(), parallel.division_frames());
}

#[test]
fn missing_count_feature_names_the_frame() {
    let mut registry = PluginRegistry::new();
    registry.register(Box::new(AbFeatures));
    let mut p = Traxelstore::new(
        InMemoryFrames::new(vec![two_object_frame()]).unwrap(),
        registry,
        ClassifierSet::default(),
        PipelineOptions::default(),
    )
    .unwrap();
    p.extract_features().unwrap();
    let err = p.assemble().unwrap_err();
    assert_eq!(err.to_string(), "missing feature 'Count' (frame 0)");
}

#[test]
fn classifier_width_mismatch_names_classifier_and_frame() {
    init_logging();
    let mut p = Traxelstore::new(
        InMemoryFrames::new(drifting_squares(2)).unwrap(),
        PluginRegistry::with_default_plugins(),
        ClassifierSet {
            count: Some(constant_classifier(&[COUNT], 3, &[0.5, 0.5])),
            ..ClassifierSet::default()
        },
        PipelineOptions::default(),
    )
    .unwrap();
    let err = p.fill_traxel_store().unwrap_err();
    assert_eq!(err.to_string(), "count classifier, frame 0");
    match err {
        PipelineError::ClassifierInput { source, .. } => assert!(matches!(
            *source,
            PipelineError::FeatureCountMismatch {
                expected: 3,
                found: 1
            }
        )),
        other => panic!("expected classifier context, got {other:?}"),
    }
}

#[test]
fn transition_vector_from_assembled_objects() {
    let p = run(drifting_squares(2), ClassifierSet::default(), PipelineOptions::default());
    let a = p.traxel_feature_dict(0, 1).unwrap();
    let b = p.traxel_feature_dict(1, 1).unwrap();
    let v = p
        .transition_feature_vector(&a, &b, &[COM.to_string(), COUNT.to_string()])
        .unwrap();
    // com (3, 3) → (4, 3), count 9 → 9
    assert_eq!(v, array![[-1.0f32, 0.0, 12.0, 9.0, 0.0, 81.0]]);
}
