//! Per-classifier training state.
//!
//! A [`ClassifierState`] groups the [`ClassState`]s of one classifier (class order is the
//! rule order of every FIS built for it) and the bucket schedule used to rewrite their
//! feedback columns.

use fistrain_cluster::{ClusterError, regression::linear_regression};
use fistrain_rules::{
    builder::{BuildError, build_classifier},
    rule_set::{EvaluationMode, RuleSet},
};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use tracing::debug;

use crate::{
    adjust_map::AdjustMap,
    class_state::{ClassState, Quality, QualityError},
    search::{CandidateOutcome, FisSearch, Fitness},
};

/// Why a FIS candidate could not be built from seed centers.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum FisError {
    #[display("got seed centers for {actual} classes, expected {expected}")]
    SeedCountMismatch { expected: usize, actual: usize },
    #[display("clustering failed: {_0}")]
    #[from]
    Cluster(ClusterError),
    #[display("rule construction failed: {_0}")]
    #[from]
    Build(BuildError),
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ClassifierStateError {
    #[display("classifier {name:?} has no classes")]
    NoClasses { name: String },
    #[display("class {class} of classifier {name:?} has {actual} features, expected {expected}")]
    DimensionMismatch {
        name: String,
        class: usize,
        expected: usize,
        actual: usize,
    },
    #[display("shuffle size must be at least 1")]
    ZeroShuffleSize,
}

/// The training state of one classifier.
#[derive(Debug, Clone)]
pub struct ClassifierState {
    name: String,
    classes: Vec<ClassState>,
    adjust_map: AdjustMap,
}

impl ClassifierState {
    /// Creates the state and deals its adjustment buckets of `shuffle_size` rows.
    ///
    /// All classes must have the same number of features.
    pub fn new<R>(
        name: impl Into<String>,
        classes: Vec<ClassState>,
        shuffle_size: usize,
        rng: &mut R,
    ) -> Result<Self, ClassifierStateError>
    where
        R: Rng + ?Sized,
    {
        let name = name.into();
        let Some(first) = classes.first() else {
            return Err(ClassifierStateError::NoClasses { name });
        };
        let expected = first.feature_count();
        if let Some((class, state)) = classes
            .iter()
            .enumerate()
            .find(|(_, c)| c.feature_count() != expected)
        {
            return Err(ClassifierStateError::DimensionMismatch {
                name,
                class,
                expected,
                actual: state.feature_count(),
            });
        }
        if shuffle_size == 0 {
            return Err(ClassifierStateError::ZeroShuffleSize);
        }

        let sizes = classes
            .iter()
            .map(ClassState::training_data_size)
            .collect::<Vec<_>>();
        let adjust_map = AdjustMap::deal(&sizes, shuffle_size, rng);
        Ok(Self {
            name,
            classes,
            adjust_map,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn classes(&self) -> &[ClassState] {
        &self.classes
    }

    #[must_use]
    pub fn adjust_map(&self) -> &AdjustMap {
        &self.adjust_map
    }

    /// Number of feature columns shared by all classes.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.classes[0].feature_count()
    }

    /// Whether the feedback column is active for every class.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.classes.iter().all(ClassState::is_extended)
    }

    /// Seed centers for every class, in class order.
    #[must_use]
    pub fn clusters(&self, range: &DVector<f64>) -> Vec<DMatrix<f64>> {
        self.classes.iter().map(|c| c.clusters(range)).collect()
    }

    /// Builds a FIS candidate from one matrix of seed centers per class.
    ///
    /// Every class is clustered with Gath-Geva from its seeds, one consequent is fitted per
    /// cluster over the pooled training rows, and the clusters become rules in class order.
    #[must_use]
    pub fn gen_fis(&self, seeds: &[DMatrix<f64>]) -> CandidateOutcome {
        match self.try_gen_fis(seeds) {
            Ok(fis) => CandidateOutcome::Built(fis),
            Err(err) => CandidateOutcome::Unavailable(err),
        }
    }

    fn try_gen_fis(&self, seeds: &[DMatrix<f64>]) -> Result<RuleSet, FisError> {
        if seeds.len() != self.classes.len() {
            return Err(FisError::SeedCountMismatch {
                expected: self.classes.len(),
                actual: seeds.len(),
            });
        }

        let mut means = Vec::with_capacity(seeds.len());
        let mut covariances = Vec::with_capacity(seeds.len());
        for (class, seed) in self.classes.iter().zip(seeds) {
            let fit = class.gath_geva(seed)?;
            means.push(fit.means);
            covariances.push(fit.covariances);
        }

        let data = self
            .classes
            .iter()
            .map(|c| (c.id(), c.training_data()))
            .collect::<Vec<_>>();
        let targets = data.iter().map(|(id, d)| (*id, d)).collect::<Vec<_>>();
        let regressions = linear_regression(&means, &covariances, &targets)?;

        let mode = if self.is_extended() {
            EvaluationMode::Sequential
        } else {
            EvaluationMode::Batched
        };
        Ok(build_classifier(&means, &covariances, &regressions, mode)?)
    }

    /// Correct classifications summed over all classes.
    pub fn quality_fis(&self, fis: &RuleSet) -> Result<Quality, QualityError> {
        self.classes
            .iter()
            .map(|class| {
                let quality = class.quality_fis(fis)?;
                debug!(
                    classifier = %self.name,
                    class = class.name().unwrap_or("-"),
                    correct = quality.correct,
                    total = quality.total,
                    "class quality"
                );
                Ok(quality)
            })
            .sum()
    }

    /// Fitness of a candidate for the genetic searches.
    #[must_use]
    pub fn eval_fis(&self, fis: &RuleSet) -> Fitness {
        match self.quality_fis(fis) {
            Ok(quality) => Fitness::Scored(quality.correct),
            Err(err) => {
                debug!(%err, "candidate cannot be scored");
                Fitness::Failed(err)
            }
        }
    }

    /// Searches the best FIS for the given normalization range.
    pub fn best_fis<S>(&self, range: &DVector<f64>, search: &mut S) -> Option<RuleSet>
    where
        S: FisSearch + ?Sized,
    {
        let seeds = self.clusters(range);
        search.evolve_fis(
            &seeds,
            &mut |selected: &[DMatrix<f64>]| self.gen_fis(selected),
            &mut |fis: &RuleSet| self.eval_fis(fis),
        )
    }

    /// Rewrites every class's feedback column with the outputs of `fis`.
    ///
    /// Buckets are visited in adjust-map order and a single feedback value rolls from one
    /// bucket to the next, also across classes. New feedback columns are committed once the
    /// whole map has been walked.
    pub fn adjust_data(&mut self, fis: &RuleSet) {
        let mut buffers = self
            .classes
            .iter()
            .map(|c| c.feedback().to_vec())
            .collect::<Vec<_>>();
        let mut last_res = 0.0;
        for bucket in self.adjust_map.buckets() {
            last_res = self.classes[bucket.class_index].adjust_data(
                fis,
                bucket.start,
                bucket.size,
                last_res,
                &mut buffers[bucket.class_index],
            );
        }
        for (class, feedback) in self.classes.iter_mut().zip(buffers) {
            class.commit_feedback(feedback);
        }
    }

    /// `(label, id)` of every named class, in class order.
    #[must_use]
    pub fn membership(&self) -> Vec<(String, f64)> {
        self.classes
            .iter()
            .filter_map(|c| c.name().map(|name| (name.to_owned(), c.id())))
            .collect()
    }

    /// Elementwise minimum of the classes' full-row ranges.
    #[must_use]
    pub fn min_range(&self) -> DVector<f64> {
        self.classes
            .iter()
            .map(ClassState::min_range)
            .reduce(|a, b| a.inf(&b))
            .unwrap_or_else(|| DVector::zeros(0))
    }

    /// Elementwise maximum of the classes' full-row ranges.
    #[must_use]
    pub fn max_range(&self) -> DVector<f64> {
        self.classes
            .iter()
            .map(ClassState::max_range)
            .reduce(|a, b| a.sup(&b))
            .unwrap_or_else(|| DVector::zeros(0))
    }

    pub fn attach_dimension(&mut self) {
        for class in &mut self.classes {
            class.attach_dimension();
        }
    }

    /// Prunes the rules of `fis`, scored with [`eval_fis`](Self::eval_fis).
    pub fn evolve_bitvector<S>(
        &self,
        fis: &mut RuleSet,
        generations: usize,
        population: usize,
        search: &mut S,
    ) where
        S: FisSearch + ?Sized,
    {
        search.evolve_bitvec(
            fis,
            &mut |fis: &RuleSet| self.eval_fis(fis),
            generations,
            population,
        );
    }
}
