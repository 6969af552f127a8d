//! Per-class training state.
//!
//! A [`ClassState`] owns the data of one target class:
//!
//! - the feature rows used for clustering and regression
//! - a *feedback column*, one value per training row, holding the output of the previous
//!   FIS for the row before it (the autoregressive input)
//! - optional held-out check rows used to score candidates
//!
//! The feedback column always exists but only becomes an active input dimension once the
//! state is *extended* (see [`ClassState::attach_dimension`]). Before that, clustering and
//! regression see the features alone.
//!
//! Feature rows never change. Feedback adjustment writes into a buffer supplied by the
//! caller, which commits it with [`ClassState::commit_feedback`] once a whole adjustment
//! pass is done.

use fistrain_cluster::{
    ClusterError,
    gath_geva::{GathGevaFit, gath_geva},
    normalize::normalize,
    subclust::subclust,
};
use fistrain_rules::{
    classifier::matches_class,
    rule_set::{EvaluationMode, RuleSet},
};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ClassStateError {
    #[display("class has no training rows")]
    EmptyTrainingData,
    #[display("check data has {actual} columns, expected {expected}")]
    CheckDataWidth { expected: usize, actual: usize },
}

/// Why a candidate could not be scored on a class.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum QualityError {
    #[display("FIS dimension {actual} does not match the expected input width {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Correct classifications out of a number of check rows.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Quality {
    pub correct: usize,
    pub total: usize,
}

impl Quality {
    /// Fraction of correct classifications, `0.0` for an empty check set.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[expect(clippy::cast_precision_loss)]
        let ratio = self.correct as f64 / self.total as f64;
        ratio
    }
}

impl std::ops::Add for Quality {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            correct: self.correct + rhs.correct,
            total: self.total + rhs.total,
        }
    }
}

impl std::iter::Sum for Quality {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |a, b| a + b)
    }
}

/// The training state of one target class.
#[derive(Debug, Clone)]
pub struct ClassState {
    name: Option<String>,
    id: f64,
    features: DMatrix<f64>,
    feedback: Vec<f64>,
    check_data: Option<DMatrix<f64>>,
    extended: bool,
    revision: usize,
}

impl ClassState {
    /// Creates a class state with a zero feedback column.
    ///
    /// `id` is both the classification target and the value the FIS should output for
    /// this class. Check rows must have the same width as the training features.
    pub fn new(
        name: Option<String>,
        id: f64,
        training_data: DMatrix<f64>,
        check_data: Option<DMatrix<f64>>,
    ) -> Result<Self, ClassStateError> {
        if training_data.nrows() == 0 {
            return Err(ClassStateError::EmptyTrainingData);
        }
        if let Some(check) = &check_data
            && check.ncols() != training_data.ncols()
        {
            return Err(ClassStateError::CheckDataWidth {
                expected: training_data.ncols(),
                actual: check.ncols(),
            });
        }
        let feedback = vec![0.0; training_data.nrows()];
        Ok(Self {
            name,
            id,
            features: training_data,
            feedback,
            check_data,
            extended: false,
            revision: 0,
        })
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn id(&self) -> f64 {
        self.id
    }

    /// Whether the feedback column is an active input dimension.
    #[must_use]
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Number of feature columns (without the feedback column).
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }

    #[must_use]
    pub fn training_data_size(&self) -> usize {
        self.features.nrows()
    }

    #[must_use]
    pub fn check_data(&self) -> Option<&DMatrix<f64>> {
        self.check_data.as_ref()
    }

    #[must_use]
    pub fn feedback(&self) -> &[f64] {
        &self.feedback
    }

    /// Number of committed feedback updates.
    #[must_use]
    pub fn revision(&self) -> usize {
        self.revision
    }

    /// Training rows with the feedback column appended.
    #[must_use]
    pub fn full_training_data(&self) -> DMatrix<f64> {
        let cols = self.features.ncols();
        DMatrix::from_fn(self.features.nrows(), cols + 1, |r, c| {
            if c < cols {
                self.features[(r, c)]
            } else {
                self.feedback[r]
            }
        })
    }

    /// The training rows as currently seen by clustering and regression.
    #[must_use]
    pub fn training_data(&self) -> DMatrix<f64> {
        if self.extended {
            self.full_training_data()
        } else {
            self.features.clone()
        }
    }

    /// Per-dimension minimum over the full (feedback-extended) rows.
    #[must_use]
    pub fn min_range(&self) -> DVector<f64> {
        self.column_extrema(f64::min, f64::INFINITY)
    }

    /// Per-dimension maximum over the full (feedback-extended) rows.
    #[must_use]
    pub fn max_range(&self) -> DVector<f64> {
        self.column_extrema(f64::max, f64::NEG_INFINITY)
    }

    fn column_extrema(&self, pick: fn(f64, f64) -> f64, init: f64) -> DVector<f64> {
        let cols = self.features.ncols();
        DVector::from_fn(cols + 1, |c, _| {
            if c < cols {
                self.features.column(c).iter().copied().fold(init, pick)
            } else {
                self.feedback.iter().copied().fold(init, pick)
            }
        })
    }

    /// Seed cluster centers for this class.
    ///
    /// The active training rows are divided by `range` (one entry per full dimension; zero
    /// entries must already be replaced by the caller), normalized and passed to
    /// subtractive clustering. The selected rows are returned in original scale.
    #[must_use]
    pub fn clusters(&self, range: &DVector<f64>) -> DMatrix<f64> {
        let data = self.training_data();
        let mut scaled = data.clone();
        for (mut column, scale) in scaled.column_iter_mut().zip(range.iter()) {
            column /= *scale;
        }
        let indices = subclust(&normalize(&scaled));
        debug!(
            class = self.name.as_deref().unwrap_or("-"),
            count = indices.len(),
            "initial clusters"
        );
        data.select_rows(indices.iter())
    }

    /// Runs Gath-Geva on the active training rows, seeded by the rows of `seeds`.
    pub fn gath_geva(&self, seeds: &DMatrix<f64>) -> Result<GathGevaFit, ClusterError> {
        gath_geva(&self.training_data(), seeds)
    }

    /// Counts correct classifications of `fis` on the check rows.
    ///
    /// A sequential FIS is evaluated row by row with the previous output appended to each
    /// check row (starting at `0.0`); a batched FIS evaluates all rows at once. A class
    /// without check data scores `0` out of `0`.
    pub fn quality_fis(&self, fis: &RuleSet) -> Result<Quality, QualityError> {
        let expected = match fis.mode() {
            EvaluationMode::Sequential => self.feature_count() + 1,
            EvaluationMode::Batched => self.feature_count(),
        };
        if fis.dimension() != expected {
            return Err(QualityError::DimensionMismatch {
                expected,
                actual: fis.dimension(),
            });
        }
        let Some(check) = &self.check_data else {
            return Ok(Quality::default());
        };

        let correct = match fis.mode() {
            EvaluationMode::Sequential => {
                let mut last_res = 0.0;
                let mut row = Vec::with_capacity(expected);
                let mut correct = 0;
                for check_row in check.row_iter() {
                    row.clear();
                    row.extend(check_row.iter().copied());
                    row.push(last_res);
                    last_res = fis.evaluate(&row);
                    if matches_class(last_res, self.id) {
                        correct += 1;
                    }
                }
                correct
            }
            EvaluationMode::Batched => fis
                .evaluates(check)
                .into_iter()
                .filter(|res| matches_class(*res, self.id))
                .count(),
        };
        Ok(Quality {
            correct,
            total: check.nrows(),
        })
    }

    /// Rewrites the feedback of rows `start..start + size` into `feedback`.
    ///
    /// Each row receives the current feedback value (`NaN` replaced by `0.0`), then the FIS
    /// is evaluated on the row to produce the value for the next row. Returns the value
    /// following the last row so callers can chain buckets.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the training rows or `feedback` has the wrong length.
    pub fn adjust_data(
        &self,
        fis: &RuleSet,
        start: usize,
        size: usize,
        mut last_res: f64,
        feedback: &mut [f64],
    ) -> f64 {
        assert_eq!(feedback.len(), self.training_data_size());
        let sequential = fis.mode().is_sequential();
        let mut row = Vec::with_capacity(self.feature_count() + 1);
        for i in start..start + size {
            if last_res.is_nan() {
                last_res = 0.0;
            }
            feedback[i] = last_res;
            row.clear();
            row.extend(self.features.row(i).iter().copied());
            if sequential {
                row.push(last_res);
            }
            last_res = fis.evaluate(&row);
        }
        last_res
    }

    /// Replaces the feedback column with the result of an adjustment pass.
    ///
    /// # Panics
    ///
    /// Panics if `feedback` does not have one value per training row.
    pub fn commit_feedback(&mut self, feedback: Vec<f64>) {
        assert_eq!(feedback.len(), self.training_data_size());
        self.feedback = feedback;
        self.revision += 1;
    }

    /// Makes the feedback column an active input dimension.
    ///
    /// The column already exists, so the data shape does not change.
    pub fn attach_dimension(&mut self) {
        self.extended = true;
    }
}

#[cfg(test)]
mod tests {
    use fistrain_rules::rule::ComplexRule;

    use super::*;

    /// A FIS with a single always-firing rule: `output = coefficients · x + intercept`.
    fn linear_fis(coefficients: &[f64], intercept: f64, mode: EvaluationMode) -> RuleSet {
        let dim = coefficients.len();
        let rule = ComplexRule::new(
            DVector::from_column_slice(coefficients),
            intercept,
            DVector::zeros(dim),
            DMatrix::zeros(dim, dim),
        );
        RuleSet::new(vec![rule], mode).unwrap()
    }

    fn class_state(id: f64) -> ClassState {
        let training = DMatrix::from_row_slice(4, 2, &[0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0]);
        let check = DMatrix::from_row_slice(3, 2, &[0.5, 1.5, 1.5, 2.5, 2.5, 3.5]);
        ClassState::new(Some("c".to_owned()), id, training, Some(check)).unwrap()
    }

    #[test]
    fn test_new_validates_shapes() {
        assert_eq!(
            ClassState::new(None, 0.0, DMatrix::zeros(0, 2), None).unwrap_err(),
            ClassStateError::EmptyTrainingData
        );
        assert_eq!(
            ClassState::new(None, 0.0, DMatrix::zeros(2, 2), Some(DMatrix::zeros(1, 3)))
                .unwrap_err(),
            ClassStateError::CheckDataWidth {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_training_data_width_follows_extension() {
        let mut state = class_state(1.0);
        assert_eq!(state.training_data().shape(), (4, 2));
        assert_eq!(state.full_training_data().shape(), (4, 3));
        state.attach_dimension();
        assert_eq!(state.training_data().shape(), (4, 3));
    }

    #[test]
    fn test_attach_dimension_twice() {
        let mut state = class_state(1.0);
        state.attach_dimension();
        let shape = state.full_training_data().shape();
        state.attach_dimension();
        assert!(state.is_extended());
        assert_eq!(state.full_training_data().shape(), shape);
        assert_eq!(state.feedback().len(), 4);
    }

    #[test]
    fn test_ranges_include_feedback_column() {
        let state = class_state(1.0);
        assert_eq!(state.min_range().as_slice(), &[0.0, 1.0, 0.0]);
        assert_eq!(state.max_range().as_slice(), &[3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_clusters_are_original_rows() {
        let state = class_state(1.0);
        let range = DVector::from_vec(vec![3.0, 3.0, 1.0]);
        let clusters = state.clusters(&range);
        assert!(clusters.nrows() >= 1);
        assert_eq!(clusters.ncols(), 2);
        for row in clusters.row_iter() {
            assert!(state.features.row_iter().any(|r| r == row));
        }
    }

    #[test]
    fn test_perfect_quality_batched() {
        let state = class_state(2.0);
        let fis = linear_fis(&[0.0, 0.0], 2.0, EvaluationMode::Batched);
        assert_eq!(
            state.quality_fis(&fis).unwrap(),
            Quality {
                correct: 3,
                total: 3
            }
        );
    }

    #[test]
    fn test_perfect_quality_sequential() {
        let state = class_state(2.0);
        let fis = linear_fis(&[0.0, 0.0, 0.0], 2.0, EvaluationMode::Sequential);
        assert_eq!(
            state.quality_fis(&fis).unwrap(),
            Quality {
                correct: 3,
                total: 3
            }
        );
    }

    #[test]
    fn test_off_by_ten_scores_zero() {
        let state = class_state(2.0);
        for fis in [
            linear_fis(&[0.0, 0.0], 12.0, EvaluationMode::Batched),
            linear_fis(&[0.0, 0.0, 0.0], 12.0, EvaluationMode::Sequential),
        ] {
            assert_eq!(
                state.quality_fis(&fis).unwrap(),
                Quality {
                    correct: 0,
                    total: 3
                }
            );
        }
    }

    #[test]
    fn test_sequential_quality_carries_feedback() {
        // output = previous output + 1: 1, 2, 3 -> only the second row hits id 2
        let state = class_state(2.0);
        let fis = linear_fis(&[0.0, 0.0, 1.0], 1.0, EvaluationMode::Sequential);
        assert_eq!(state.quality_fis(&fis).unwrap().correct, 1);
    }

    #[test]
    fn test_quality_errors() {
        let state = class_state(2.0);
        let fis = linear_fis(&[0.0, 0.0, 0.0], 2.0, EvaluationMode::Batched);
        assert_eq!(
            state.quality_fis(&fis).unwrap_err(),
            QualityError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );

        let no_check = ClassState::new(None, 2.0, DMatrix::zeros(2, 2), None).unwrap();
        let fis = linear_fis(&[0.0, 0.0], 2.0, EvaluationMode::Batched);
        assert_eq!(
            no_check.quality_fis(&fis).unwrap(),
            Quality {
                correct: 0,
                total: 0
            }
        );
    }

    #[test]
    fn test_adjust_data_chains_feedback() {
        let state = class_state(1.0);
        let fis = linear_fis(&[0.0, 0.0, 1.0], 1.0, EvaluationMode::Sequential);
        let mut feedback = state.feedback().to_vec();
        let last = state.adjust_data(&fis, 1, 2, 5.0, &mut feedback);
        assert_eq!(feedback, vec![0.0, 5.0, 6.0, 0.0]);
        assert!((last - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_adjust_data_resets_nan() {
        let state = class_state(1.0);
        let fis = linear_fis(&[1.0, 0.0], 0.0, EvaluationMode::Batched);
        let mut feedback = state.feedback().to_vec();
        let last = state.adjust_data(&fis, 0, 4, f64::NAN, &mut feedback);
        // batched: feedback is the previous row's first feature
        assert_eq!(feedback, vec![0.0, 0.0, 1.0, 2.0]);
        assert!((last - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_commit_feedback_keeps_shape() {
        let mut state = class_state(1.0);
        let fis = linear_fis(&[0.0, 0.0], 1.0, EvaluationMode::Batched);
        let mut feedback = state.feedback().to_vec();
        state.adjust_data(&fis, 0, 4, 0.0, &mut feedback);
        state.commit_feedback(feedback);
        assert_eq!(state.revision(), 1);
        assert_eq!(state.full_training_data().shape(), (4, 3));
        assert_eq!(state.feedback(), &[0.0, 1.0, 1.0, 1.0]);
        assert_eq!(state.features.shape(), (4, 2));
    }
}
