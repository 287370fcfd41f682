use super::transition::{transition_feature_vector, FeatureDict};
use super::{PipelineOptions, PipelineStage};
use crate::classifier::Classifier;
use crate::diagnostics::{RunReport, STAGE_ASSEMBLY, STAGE_DIVISION, STAGE_FEATURES};
use crate::division::DivisionFeatureEngine;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureMapping, PluginRegistry, COM, COUNT, REGION_CENTER};
use crate::frames::FrameAccessor;
use crate::store::TraxelStore;
use crate::traxel::Traxel;
use log::{debug, info};
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Classifiers evaluated during assembly and by transition queries.
#[derive(Debug, Default)]
pub struct ClassifierSet {
    /// Object count classifier, stored as the detection probability.
    pub count: Option<Classifier>,
    /// Division classifier; enables the division feature pass.
    pub division: Option<Classifier>,
    /// Evaluated on demand by [`Traxelstore::transition_probability`].
    pub transition: Option<Classifier>,
}

/// Feature extraction, classification and traxel assembly over the time
/// range of a frame accessor.
pub struct Traxelstore<F: FrameAccessor> {
    frames: F,
    registry: PluginRegistry,
    classifiers: ClassifierSet,
    division_engine: DivisionFeatureEngine,
    options: PipelineOptions,
    stage: PipelineStage,
    features: BTreeMap<usize, FeatureMapping>,
    division_frames: BTreeSet<usize>,
    store: TraxelStore,
    report: RunReport,
}

struct FrameAssembly {
    traxels: Vec<Traxel>,
    seen: usize,
    rejected: usize,
}

/// Run `f` for every timestep, on the rayon pool when `parallel` is set.
/// Results keep the order of `timesteps`.
fn map_frames<T, G>(parallel: bool, timesteps: &[usize], f: G) -> Result<Vec<(usize, T)>>
where
    T: Send,
    G: Fn(usize) -> Result<T> + Sync + Send,
{
    if parallel {
        timesteps
            .par_iter()
            .map(|&t| f(t).map(|value| (t, value)))
            .collect()
    } else {
        timesteps
            .iter()
            .map(|&t| f(t).map(|value| (t, value)))
            .collect()
    }
}

fn frame_features<F: FrameAccessor>(
    frames: &F,
    registry: &PluginRegistry,
    timestep: usize,
) -> Result<FeatureMapping> {
    let raw = frames.raw_image(timestep)?;
    let labels = frames.label_image(timestep)?;
    let mapping = registry.compute(&raw, &labels, timestep)?;
    debug!(
        "frame {}: {} objects, {} features",
        timestep,
        mapping.num_objects().saturating_sub(1),
        mapping.len()
    );
    Ok(mapping)
}

fn predict(
    kind: &str,
    classifier: Option<&Classifier>,
    mapping: &FeatureMapping,
    timestep: usize,
) -> Result<Option<Array2<f64>>> {
    classifier
        .map(|c| c.predict_probabilities(mapping))
        .transpose()
        .map_err(|e| e.for_classifier(kind, timestep))
}

impl<F: FrameAccessor> Traxelstore<F> {
    /// Set up a run. Division feature names from `options` are validated
    /// here.
    pub fn new(
        frames: F,
        registry: PluginRegistry,
        classifiers: ClassifierSet,
        options: PipelineOptions,
    ) -> Result<Self> {
        let division_engine = DivisionFeatureEngine::with_features(&options.division_features)?;
        if registry.is_empty() {
            return Err(PipelineError::configuration("no feature plugins registered"));
        }
        Ok(Self {
            frames,
            registry,
            classifiers,
            division_engine,
            options,
            stage: PipelineStage::Uninitialized,
            features: BTreeMap::new(),
            division_frames: BTreeSet::new(),
            store: TraxelStore::new(),
            report: RunReport::default(),
        })
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn frames(&self) -> &F {
        &self.frames
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn classifiers(&self) -> &ClassifierSet {
        &self.classifiers
    }

    pub fn num_dimensions(&self) -> usize {
        self.frames.num_dimensions()
    }

    /// Feature mapping of one frame, once region features are extracted.
    pub fn frame_features(&self, timestep: usize) -> Option<&FeatureMapping> {
        self.features.get(&timestep)
    }

    /// Timesteps whose mapping received division features.
    pub fn division_frames(&self) -> &BTreeSet<usize> {
        &self.division_frames
    }

    pub fn store(&self) -> &TraxelStore {
        &self.store
    }

    pub fn into_store(self) -> TraxelStore {
        self.store
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Replace the division features; only before the division pass ran.
    pub fn set_division_features<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        self.require(
            "set_division_features",
            &[PipelineStage::Uninitialized, PipelineStage::FeaturesExtracted],
        )?;
        self.division_engine.set_division_features(names)?;
        self.options.division_features = self.division_engine.feature_names();
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: &[PipelineStage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(PipelineError::Usage {
                operation,
                stage: self.stage,
            })
        }
    }

    fn timesteps(&self) -> Vec<usize> {
        self.frames.time_range().collect()
    }

    /// Pass 1: region features of every frame.
    pub fn extract_features(&mut self) -> Result<()> {
        self.require("extract_features", &[PipelineStage::Uninitialized])?;
        let timesteps = self.timesteps();
        info!(
            "extracting region features for {} frames{}",
            timesteps.len(),
            if self.options.parallel { " in parallel" } else { "" }
        );
        let start = Instant::now();
        let (frames, registry) = (&self.frames, &self.registry);
        let results = map_frames(self.options.parallel, &timesteps, |t| {
            frame_features(frames, registry, t)
        })?;
        self.features = results.into_iter().collect();
        self.report.frames_processed = self.features.len();
        self.report
            .timings
            .record(STAGE_FEATURES, start, timesteps.len());
        self.stage = PipelineStage::FeaturesExtracted;
        Ok(())
    }

    /// Pass 2: division features for every frame with a successor in range,
    /// merged into that frame's mapping. The last frame gets none.
    pub fn extract_division_features(&mut self) -> Result<()> {
        self.require("extract_division_features", &[PipelineStage::FeaturesExtracted])?;
        if self.classifiers.division.is_none() {
            return Err(PipelineError::configuration(
                "division features requested without a division classifier",
            ));
        }
        let range = self.frames.time_range();
        let pairs: Vec<usize> = range.clone().filter(|t| t + 1 < range.end).collect();
        info!(
            "extracting division features for {} frame pairs",
            pairs.len()
        );
        let start = Instant::now();
        let (frames, engine, features) = (&self.frames, &self.division_engine, &self.features);
        let results = map_frames(self.options.parallel, &pairs, |t| {
            let (Some(parents), Some(children)) = (features.get(&t), features.get(&(t + 1)))
            else {
                return Err(PipelineError::not_found(format!(
                    "region features of frames {t} and {}",
                    t + 1
                )));
            };
            let child_labels = frames.label_image(t + 1)?;
            engine.compute(t, parents, children, &child_labels)
        })?;
        for (t, division) in results {
            let mapping = self
                .features
                .get_mut(&t)
                .ok_or_else(|| PipelineError::not_found(format!("region features of frame {t}")))?;
            mapping.extend_disjoint(division)?;
            self.division_frames.insert(t);
        }
        self.report.frames_with_division_features = self.division_frames.len();
        self.report.timings.record(STAGE_DIVISION, start, pairs.len());
        self.stage = PipelineStage::DivisionFeaturesExtracted;
        Ok(())
    }

    fn assemble_frame(&self, timestep: usize, mapping: &FeatureMapping) -> Result<FrameAssembly> {
        let detection = predict("count", self.classifiers.count.as_ref(), mapping, timestep)?;
        let division = if self.division_frames.contains(&timestep) {
            predict("division", self.classifiers.division.as_ref(), mapping, timestep)?
        } else {
            None
        };
        let counts = mapping.dense(COUNT).map_err(|e| e.in_frame(timestep))?;
        if counts.ncols() == 0 {
            return Err(PipelineError::shape_mismatch(
                format!("'{COUNT}' of frame {timestep}"),
                vec![1],
                vec![0],
            ));
        }
        let ndim = self.frames.num_dimensions();
        let n = mapping.num_objects();
        let mut out = FrameAssembly {
            traxels: Vec::new(),
            seen: n.saturating_sub(1),
            rejected: 0,
        };

        for obj in 1..n {
            let id = obj as u32;
            let count = counts[[obj, 0]];
            if let Some(filter) = &self.options.size_filter {
                if !filter.contains(count) {
                    out.rejected += 1;
                    continue;
                }
            }
            let mut traxel = Traxel::new(id, timestep, self.options.scale);
            for (name, array) in mapping.iter() {
                let values = array.object_values(obj).ok_or_else(|| {
                    PipelineError::shape_mismatch(
                        format!("rows of feature '{name}'"),
                        vec![obj + 1],
                        vec![array.num_objects()],
                    )
                    .for_object(timestep, id, name)
                })?;
                traxel.set_feature(name, values);
            }
            let com = traxel
                .feature(REGION_CENTER)
                .map_err(|e| e.for_object(timestep, id, COM))?
                .to_vec();
            if com.len() != ndim {
                return Err(PipelineError::shape_mismatch(
                    format!("'{REGION_CENTER}' of a {ndim}-D frame"),
                    vec![ndim],
                    vec![com.len()],
                )
                .for_object(timestep, id, COM));
            }
            traxel.set_feature(COM, com);
            if let Some(p) = &detection {
                traxel.set_feature(self.options.detection_probability.as_str(), p.row(obj).to_vec());
            }
            if let Some(p) = &division {
                traxel.set_feature(self.options.division_probability.as_str(), p.row(obj).to_vec());
            }
            out.traxels.push(traxel);
        }
        debug!(
            "frame {}: {} traxels, {} rejected by size",
            timestep,
            out.traxels.len(),
            out.rejected
        );
        Ok(out)
    }

    /// Assembly: one traxel per object passing the size filter.
    pub fn assemble(&mut self) -> Result<()> {
        let allowed: &[PipelineStage] = if self.classifiers.division.is_some() {
            &[PipelineStage::DivisionFeaturesExtracted]
        } else {
            &[
                PipelineStage::FeaturesExtracted,
                PipelineStage::DivisionFeaturesExtracted,
            ]
        };
        self.require("assemble", allowed)?;
        info!("creating traxels for {} frames", self.features.len());
        let start = Instant::now();
        let timesteps: Vec<usize> = self.features.keys().copied().collect();
        let this = &*self;
        let results = map_frames(self.options.parallel, &timesteps, |t| {
            match this.features.get(&t) {
                Some(mapping) => this.assemble_frame(t, mapping),
                None => Err(PipelineError::not_found(format!("region features of frame {t}"))),
            }
        })?;

        let mut store = TraxelStore::new();
        let (mut seen, mut rejected) = (0, 0);
        for (_, frame) in results {
            seen += frame.seen;
            rejected += frame.rejected;
            store.extend(frame.traxels);
        }
        self.report.objects_seen = seen;
        self.report.objects_rejected_by_size = rejected;
        self.report.traxels_created = store.len();
        self.report
            .timings
            .record(STAGE_ASSEMBLY, start, timesteps.len());
        self.store = store;
        self.stage = PipelineStage::Assembled;
        info!("{}", self.report.summary());
        Ok(())
    }

    /// Run every remaining stage: region features, division features when a
    /// division classifier is configured, then assembly.
    pub fn fill_traxel_store(&mut self) -> Result<&TraxelStore> {
        self.require("fill_traxel_store", &[PipelineStage::Uninitialized])?;
        self.extract_features()?;
        if self.classifiers.division.is_some() {
            self.extract_division_features()?;
        }
        self.assemble()?;
        Ok(&self.store)
    }

    /// Every feature of one object as stored in its frame's mapping, plus the
    /// `com` alias. Size-filtered objects are included.
    pub fn traxel_feature_dict(&self, timestep: usize, object: u32) -> Result<FeatureDict> {
        self.require("traxel_feature_dict", &[PipelineStage::Assembled])?;
        let mapping = self
            .features
            .get(&timestep)
            .ok_or_else(|| PipelineError::not_found(format!("frame {timestep}")))?;
        let obj = object as usize;
        if obj == 0 || obj >= mapping.num_objects() {
            return Err(PipelineError::not_found(format!(
                "object {object} in frame {timestep}"
            )));
        }
        let mut dict = FeatureDict::new();
        for (name, _) in mapping.iter() {
            let values = mapping
                .object_values(name, obj)
                .map_err(|e| e.for_object(timestep, object, name))?;
            if name == REGION_CENTER {
                dict.insert(COM.to_string(), values.clone());
            }
            dict.insert(name.to_string(), values);
        }
        Ok(dict)
    }

    /// Difference and product of `selected` features of two objects as a
    /// single-row classifier input.
    pub fn transition_feature_vector(
        &self,
        a: &FeatureDict,
        b: &FeatureDict,
        selected: &[String],
    ) -> Result<Array2<f32>> {
        self.require("transition_feature_vector", &[PipelineStage::Assembled])?;
        transition_feature_vector(a, b, selected)
    }

    /// Transition classifier output for object `a` at `frame_a` moving to
    /// object `b` at `frame_b`.
    pub fn transition_probability(
        &self,
        frame_a: usize,
        object_a: u32,
        frame_b: usize,
        object_b: u32,
    ) -> Result<Vec<f64>> {
        self.require("transition_probability", &[PipelineStage::Assembled])?;
        let classifier = self
            .classifiers
            .transition
            .as_ref()
            .ok_or_else(|| PipelineError::configuration("no transition classifier configured"))?;
        let a = self.traxel_feature_dict(frame_a, object_a)?;
        let b = self.traxel_feature_dict(frame_b, object_b)?;
        let probabilities = transition_feature_vector(&a, &b, classifier.selected_features())
            .and_then(|input| classifier.predict_matrix(input.view()))
            .map_err(|e| e.for_classifier("transition", frame_a))?;
        Ok(probabilities.row(0).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ConstantModel;
    use crate::frames::InMemoryFrames;
    use ndarray::{Array2 as A2, ArrayD};

    fn square_frame(offset: usize) -> (ArrayD<f32>, ArrayD<u32>) {
        let mut labels = A2::<u32>::zeros((10, 10));
        for x in 0..2 {
            for y in 0..2 {
                labels[[x + offset, y + offset]] = 1;
                labels[[x + offset + 5, y + offset]] = 2;
            }
        }
        let raw = labels.mapv(|v| v as f32 * 10.0);
        (raw.into_dyn(), labels.into_dyn())
    }

    fn pipeline(classifiers: ClassifierSet) -> Traxelstore<InMemoryFrames> {
        let frames =
            InMemoryFrames::new(vec![square_frame(0), square_frame(1), square_frame(2)]).unwrap();
        Traxelstore::new(
            frames,
            PluginRegistry::with_default_plugins(),
            classifiers,
            PipelineOptions::default(),
        )
        .unwrap()
    }

    fn constant(probabilities: Vec<f64>) -> Classifier {
        Classifier::new(
            vec![Box::new(ConstantModel::new(1, probabilities))],
            vec![COUNT.to_string()],
        )
        .unwrap()
    }

    #[test]
    fn stages_must_run_in_order() {
        let mut p = pipeline(ClassifierSet::default());
        assert!(matches!(
            p.assemble(),
            Err(PipelineError::Usage {
                operation: "assemble",
                stage: PipelineStage::Uninitialized
            })
        ));
        assert!(matches!(
            p.traxel_feature_dict(0, 1),
            Err(PipelineError::Usage { .. })
        ));
        p.extract_features().unwrap();
        assert!(matches!(
            p.extract_features(),
            Err(PipelineError::Usage { .. })
        ));
        assert!(p.transition_feature_vector(&FeatureDict::new(), &FeatureDict::new(), &[]).is_err());
        p.assemble().unwrap();
        assert_eq!(p.stage(), PipelineStage::Assembled);
        assert_eq!(p.store().len(), 6);
        assert!(p.set_division_features(&["ChildrenRatio_Count"]).is_err());
    }

    #[test]
    fn division_classifier_requires_division_pass() {
        let mut p = pipeline(ClassifierSet {
            division: Some(constant(vec![0.9, 0.1])),
            ..ClassifierSet::default()
        });
        p.extract_features().unwrap();
        assert!(matches!(p.assemble(), Err(PipelineError::Usage { .. })));
        p.extract_division_features().unwrap();
        p.assemble().unwrap();
        assert_eq!(p.division_frames().iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        let first = p.store().get(0, 1).unwrap();
        assert_eq!(first.feature("divProb").unwrap(), &[0.9, 0.1]);
        let last = p.store().get(2, 1).unwrap();
        assert!(!last.has_feature("divProb"));
        assert!(!last.has_feature("ChildrenRatio_Count"));
    }

    #[test]
    fn division_pass_without_classifier_is_rejected() {
        let mut p = pipeline(ClassifierSet::default());
        p.extract_features().unwrap();
        assert!(matches!(
            p.extract_division_features(),
            Err(PipelineError::Configuration { .. })
        ));
    }

    #[test]
    fn feature_dict_matches_mapping_rows() {
        let mut p = pipeline(ClassifierSet {
            count: Some(constant(vec![0.2, 0.8])),
            ..ClassifierSet::default()
        });
        p.fill_traxel_store().unwrap();
        let dict = p.traxel_feature_dict(1, 2).unwrap();
        assert_eq!(dict[COM], vec![6.5, 1.5]);
        assert_eq!(dict[COUNT], vec![4.0]);
        assert_eq!(
            p.store().get(1, 2).unwrap().feature("detProb").unwrap(),
            &[0.2, 0.8]
        );
        assert!(matches!(
            p.traxel_feature_dict(1, 3),
            Err(PipelineError::NotFound { .. })
        ));
    }

    #[test]
    fn transition_probability_uses_transition_classifier() {
        let transition = Classifier::new(
            vec![Box::new(ConstantModel::new(2, vec![0.4, 0.6]))],
            vec![COUNT.to_string()],
        )
        .unwrap();
        let mut p = pipeline(ClassifierSet {
            transition: Some(transition),
            ..ClassifierSet::default()
        });
        p.fill_traxel_store().unwrap();
        assert_eq!(p.transition_probability(0, 1, 1, 1).unwrap(), vec![0.4, 0.6]);

        let mut q = pipeline(ClassifierSet::default());
        q.fill_traxel_store().unwrap();
        assert!(matches!(
            q.transition_probability(0, 1, 1, 1),
            Err(PipelineError::Configuration { .. })
        ));
    }
}
