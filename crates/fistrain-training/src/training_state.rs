//! The training run: classifiers trained one after another.
//!
//! # Training Loop
//!
//! For every classifier, [`TrainingState::build_fis`] runs `gg_iterations` iterations:
//!
//! 1. **Range** - Per-dimension `max - min` over *all* classifiers, zero entries set to 1
//! 2. **Progress** - Report `(i + it / iterations) / classifiers`
//! 3. **Search** - Ask the FIS search for the best candidate of this classifier
//! 4. **Keep Best** - Score the candidate on the check rows; a later candidate replaces the
//!    current best only with strictly more correct classifications
//! 5. **Extend** - After the first iteration the feedback column becomes an input dimension
//! 6. **Adjust** - Rewrite the feedback columns with the outputs of this iteration's FIS
//!
//! A classifier without any candidate aborts the whole run. Otherwise its best FIS is
//! optionally pruned by bit-vector search and added to the ensemble.

use fistrain_rules::{
    classifier::{Classifier, ClassifierSet},
    rule_set::RuleSet,
};
use nalgebra::DVector;
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use tracing::{info, warn};

use crate::{
    class_state::ClassState,
    classifier_state::{ClassifierState, ClassifierStateError},
    parameter::{ParameterError, TrainingParameter},
    search::{FisSearch, GeneticSearch},
};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum TrainingError {
    #[display("invalid training parameter: {_0}")]
    #[from]
    Parameter(ParameterError),
    #[display("invalid classifier: {_0}")]
    #[from]
    Classifier(ClassifierStateError),
    #[display("classifier {name:?} has {actual} features, expected {expected}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Progress callback, called with values in `[0, 1]`.
pub type Progress<'a> = dyn FnMut(f64) + 'a;

/// All classifiers of a training run and the run's RNG.
#[derive(Debug)]
pub struct TrainingState {
    parameter: TrainingParameter,
    classifiers: Vec<ClassifierState>,
    rng: Pcg32,
}

impl TrainingState {
    /// Creates an empty run, seeding the RNG from `parameter.seed` or the OS.
    pub fn new(parameter: TrainingParameter) -> Result<Self, TrainingError> {
        let rng = match parameter.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_os_rng(),
        };
        Self::with_rng(parameter, rng)
    }

    pub fn with_rng(parameter: TrainingParameter, rng: Pcg32) -> Result<Self, TrainingError> {
        parameter.validate()?;
        Ok(Self {
            parameter,
            classifiers: vec![],
            rng,
        })
    }

    #[must_use]
    pub fn parameter(&self) -> &TrainingParameter {
        &self.parameter
    }

    #[must_use]
    pub fn classifiers(&self) -> &[ClassifierState] {
        &self.classifiers
    }

    /// Adds a classifier; its adjustment buckets are dealt now.
    ///
    /// Every classifier must have the same number of features.
    pub fn add_classifier(
        &mut self,
        name: impl Into<String>,
        classes: Vec<ClassState>,
    ) -> Result<(), TrainingError> {
        let state = ClassifierState::new(name, classes, self.parameter.shuffle_size, &mut self.rng)?;
        if let Some(first) = self.classifiers.first()
            && first.feature_count() != state.feature_count()
        {
            return Err(TrainingError::DimensionMismatch {
                name: state.name().to_owned(),
                expected: first.feature_count(),
                actual: state.feature_count(),
            });
        }
        self.classifiers.push(state);
        Ok(())
    }

    /// Elementwise minimum over all classifiers, `None` without classifiers.
    #[must_use]
    pub fn min_range(&self) -> Option<DVector<f64>> {
        self.classifiers
            .iter()
            .map(ClassifierState::min_range)
            .reduce(|a, b| a.inf(&b))
    }

    /// Elementwise maximum over all classifiers, `None` without classifiers.
    #[must_use]
    pub fn max_range(&self) -> Option<DVector<f64>> {
        self.classifiers
            .iter()
            .map(ClassifierState::max_range)
            .reduce(|a, b| a.sup(&b))
    }

    /// `max_range - min_range` with zero entries replaced by `1.0`.
    #[must_use]
    pub fn normalization_range(&self) -> Option<DVector<f64>> {
        let mut range = self.max_range()? - self.min_range()?;
        for value in &mut range {
            if *value == 0.0 {
                *value = 1.0;
            }
        }
        Some(range)
    }

    /// Trains every classifier with the default genetic search.
    ///
    /// Returns `None` if some classifier never produced a candidate.
    pub fn build_fis(&mut self, progress: Option<&mut Progress<'_>>) -> Option<ClassifierSet> {
        let mut search = GeneticSearch::new(
            self.parameter.gg_generations,
            self.parameter.gg_population_size,
            Pcg32::from_rng(&mut self.rng),
        );
        self.build_fis_with(&mut search, progress)
    }

    /// Trains every classifier with the given search.
    pub fn build_fis_with<S>(
        &mut self,
        search: &mut S,
        mut progress: Option<&mut Progress<'_>>,
    ) -> Option<ClassifierSet>
    where
        S: FisSearch + ?Sized,
    {
        let iterations = self.parameter.gg_iterations;
        let count = self.classifiers.len();
        let mut classifiers = Vec::with_capacity(count);

        for i in 0..count {
            let mut best: Option<(usize, RuleSet)> = None;
            for it in 0..iterations {
                let range = self.normalization_range()?;
                if let Some(cb) = progress.as_mut() {
                    #[expect(clippy::cast_precision_loss)]
                    let fraction = (i as f64 + it as f64 / iterations as f64) / count as f64;
                    cb(fraction);
                }

                let state = &mut self.classifiers[i];
                let Some(fis) = state.best_fis(&range, search) else {
                    warn!(classifier = state.name(), iteration = it, "no FIS candidate");
                    continue;
                };
                let correct = match state.quality_fis(&fis) {
                    Ok(quality) => {
                        info!(
                            classifier = state.name(),
                            iteration = it,
                            correct = quality.correct,
                            total = quality.total,
                            "quality: {:.2}%",
                            100.0 * quality.ratio()
                        );
                        quality.correct
                    }
                    Err(err) => {
                        warn!(classifier = state.name(), iteration = it, %err, "quality unavailable");
                        0
                    }
                };
                if best.as_ref().is_none_or(|(best, _)| correct > *best) {
                    best = Some((correct, fis.clone()));
                }
                if it == 0 {
                    state.attach_dimension();
                }
                state.adjust_data(&fis);
            }

            let state = &self.classifiers[i];
            let Some((_, mut best)) = best else {
                warn!(classifier = state.name(), "training failed: no viable FIS");
                return None;
            };
            if self.parameter.bitvec_enabled {
                state.evolve_bitvector(
                    &mut best,
                    self.parameter.bitvec_generations,
                    self.parameter.bitvec_popsize,
                    search,
                );
            }
            classifiers.push(Classifier::new(
                best,
                state.membership(),
                Some(state.name().to_owned()),
            ));
        }

        if let Some(cb) = progress.as_mut() {
            cb(1.0);
        }
        Some(ClassifierSet::new(classifiers))
    }
}

#[cfg(test)]
mod tests {
    use fistrain_rules::rule::ComplexRule;
    use nalgebra::DMatrix;

    use super::*;
    use crate::search::{CandidateBuilder, FitnessFn};

    fn parameter(iterations: usize, bitvec_enabled: bool) -> TrainingParameter {
        TrainingParameter {
            gg_iterations: iterations,
            bitvec_enabled,
            seed: Some(1),
            ..TrainingParameter::default()
        }
    }

    fn blob(cx: f64, cy: f64) -> DMatrix<f64> {
        let offsets = [
            (0.0, 0.0),
            (0.2, 0.1),
            (0.1, 0.3),
            (-0.1, 0.1),
            (0.3, -0.2),
            (-0.2, -0.1),
        ];
        DMatrix::from_fn(offsets.len(), 2, |r, c| {
            if c == 0 {
                cx + offsets[r].0
            } else {
                cy + offsets[r].1
            }
        })
    }

    fn blob_classes() -> Vec<ClassState> {
        vec![
            ClassState::new(
                Some("low".to_owned()),
                1.0,
                blob(0.0, 0.0),
                Some(blob(0.05, 0.05)),
            )
            .unwrap(),
            ClassState::new(
                Some("high".to_owned()),
                2.0,
                blob(5.0, 5.0),
                Some(blob(5.05, 4.95)),
            )
            .unwrap(),
        ]
    }

    /// Never finds a candidate.
    struct NullSearch;

    impl FisSearch for NullSearch {
        fn evolve_fis(
            &mut self,
            _seeds: &[DMatrix<f64>],
            _build: &mut CandidateBuilder<'_>,
            _fitness: &mut FitnessFn<'_>,
        ) -> Option<RuleSet> {
            None
        }

        fn evolve_bitvec(
            &mut self,
            _fis: &mut RuleSet,
            _fitness: &mut FitnessFn<'_>,
            _generations: usize,
            _population: usize,
        ) {
        }
    }

    /// Builds from the first seed of every class and records pruning requests.
    #[derive(Default)]
    struct FirstSeedSearch {
        searches: usize,
        prunes: usize,
    }

    impl FisSearch for FirstSeedSearch {
        fn evolve_fis(
            &mut self,
            seeds: &[DMatrix<f64>],
            build: &mut CandidateBuilder<'_>,
            _fitness: &mut FitnessFn<'_>,
        ) -> Option<RuleSet> {
            self.searches += 1;
            let first = seeds
                .iter()
                .map(|s| s.rows(0, 1).into_owned())
                .collect::<Vec<_>>();
            build(&first).into_candidate()
        }

        fn evolve_bitvec(
            &mut self,
            _fis: &mut RuleSet,
            _fitness: &mut FitnessFn<'_>,
            _generations: usize,
            _population: usize,
        ) {
            self.prunes += 1;
        }
    }

    /// Returns a fixed rule set and counts pruning requests.
    struct FixedSearch {
        fis: RuleSet,
        prunes: usize,
    }

    impl FisSearch for FixedSearch {
        fn evolve_fis(
            &mut self,
            _seeds: &[DMatrix<f64>],
            _build: &mut CandidateBuilder<'_>,
            _fitness: &mut FitnessFn<'_>,
        ) -> Option<RuleSet> {
            Some(self.fis.clone())
        }

        fn evolve_bitvec(
            &mut self,
            _fis: &mut RuleSet,
            _fitness: &mut FitnessFn<'_>,
            _generations: usize,
            _population: usize,
        ) {
            self.prunes += 1;
        }
    }

    fn single_row_class(row: &[f64]) -> Vec<ClassState> {
        vec![ClassState::new(None, 0.0, DMatrix::from_row_slice(1, row.len(), row), None).unwrap()]
    }

    #[test]
    fn test_invalid_parameter_is_rejected() {
        let parameter = TrainingParameter {
            gg_generations: 0,
            ..TrainingParameter::default()
        };
        assert!(matches!(
            TrainingState::new(parameter),
            Err(TrainingError::Parameter(_))
        ));
    }

    #[test]
    fn test_ranges_span_all_classifiers() {
        let mut state = TrainingState::new(parameter(1, false)).unwrap();
        assert!(state.normalization_range().is_none());
        state.add_classifier("a", single_row_class(&[0.0, 5.0])).unwrap();
        state.add_classifier("b", single_row_class(&[2.0, 8.0])).unwrap();

        assert_eq!(state.min_range().unwrap().as_slice(), &[0.0, 5.0, 0.0]);
        assert_eq!(state.max_range().unwrap().as_slice(), &[2.0, 8.0, 0.0]);
        // the untouched feedback column has zero range
        assert_eq!(
            state.normalization_range().unwrap().as_slice(),
            &[2.0, 3.0, 1.0]
        );
    }

    #[test]
    fn test_classifier_width_mismatch() {
        let mut state = TrainingState::new(parameter(1, false)).unwrap();
        state.add_classifier("a", single_row_class(&[0.0, 5.0])).unwrap();
        assert_eq!(
            state
                .add_classifier("b", single_row_class(&[1.0]))
                .unwrap_err(),
            TrainingError::DimensionMismatch {
                name: "b".to_owned(),
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(state.classifiers().len(), 1);
    }

    #[test]
    fn test_fails_fast_without_candidate() {
        for iterations in [1, 3] {
            let mut state = TrainingState::new(parameter(iterations, true)).unwrap();
            state.add_classifier("a", blob_classes()).unwrap();
            state.add_classifier("b", blob_classes()).unwrap();

            let mut reported = vec![];
            let mut cb = |p: f64| reported.push(p);
            let result = state.build_fis_with(&mut NullSearch, Some(&mut cb));
            assert!(result.is_none());
            // only the first classifier was attempted, and completion was never reported
            assert_eq!(reported.len(), iterations);
            assert!(reported[0].abs() < 1e-12);
            assert!(reported.iter().all(|p| *p < 0.5));
            // no candidate: no feedback rewrite, no extension
            for classifier in state.classifiers() {
                for class in classifier.classes() {
                    assert_eq!(class.revision(), 0);
                    assert!(!class.is_extended());
                }
            }
        }
    }

    #[test]
    fn test_progress_reports_per_iteration() {
        let mut state = TrainingState::new(parameter(2, false)).unwrap();
        state.add_classifier("a", blob_classes()).unwrap();
        state.add_classifier("b", blob_classes()).unwrap();

        let mut reported = vec![];
        let mut cb = |p: f64| reported.push(p);
        let result = state.build_fis_with(&mut FirstSeedSearch::default(), Some(&mut cb));
        assert!(result.is_some());
        assert_eq!(reported, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_trains_separable_blobs() {
        let mut state = TrainingState::new(parameter(2, true)).unwrap();
        state.add_classifier("blobs", blob_classes()).unwrap();

        let mut search = FirstSeedSearch::default();
        let set = state.build_fis_with(&mut search, None).unwrap();
        assert_eq!(search.searches, 2);
        assert_eq!(search.prunes, 1);

        assert_eq!(set.len(), 1);
        let classifier = set.get("blobs").unwrap();
        assert_eq!(
            classifier.membership(),
            &[("low".to_owned(), 1.0), ("high".to_owned(), 2.0)]
        );
        // the first candidate already classifies every check row
        assert!(classifier.fis().mode().is_batched());
        let low = classifier.evaluate_rows(&blob(0.05, 0.05)).unwrap();
        assert!(low.iter().all(|o| classifier.classify(*o) == Some("low")));
        let high = classifier.evaluate_rows(&blob(5.05, 4.95)).unwrap();
        assert!(high.iter().all(|o| classifier.classify(*o) == Some("high")));

        for class in state.classifiers()[0].classes() {
            assert!(class.is_extended());
            assert_eq!(class.revision(), 2);
            assert_eq!(class.full_training_data().shape(), (6, 3));
        }
    }

    #[test]
    fn test_fixed_candidate_without_pruning() {
        let rule = ComplexRule::new(
            DVector::zeros(2),
            1.0,
            DVector::zeros(2),
            DMatrix::identity(2, 2),
        );
        let fis = RuleSet::new(vec![rule], fistrain_rules::rule_set::EvaluationMode::Batched)
            .unwrap();
        let mut search = FixedSearch {
            fis: fis.clone(),
            prunes: 0,
        };

        let mut state = TrainingState::new(parameter(3, false)).unwrap();
        state.add_classifier("blobs", blob_classes()).unwrap();
        let set = state.build_fis_with(&mut search, None).unwrap();
        assert_eq!(search.prunes, 0);
        assert_eq!(set.classifiers()[0].fis(), &fis);
    }

    #[test]
    fn test_default_search_is_reproducible() {
        let train = || {
            let mut state = TrainingState::new(TrainingParameter {
                gg_generations: 2,
                gg_population_size: 4,
                bitvec_generations: 2,
                bitvec_popsize: 4,
                seed: Some(7),
                ..TrainingParameter::default()
            })
            .unwrap();
            state.add_classifier("blobs", blob_classes()).unwrap();
            let set = state.build_fis(None);
            let feedback = state.classifiers()[0]
                .classes()
                .iter()
                .map(|c| c.feedback().to_vec())
                .collect::<Vec<_>>();
            (set, feedback)
        };
        assert_eq!(train(), train());
    }
}
