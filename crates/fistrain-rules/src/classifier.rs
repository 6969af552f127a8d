//! Named classifiers and the ordered ensemble produced by training.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::rule_set::{EvaluationMode, RuleSet, RuleSetError};

/// Half-width of the interval around a class id that counts as that class.
pub const CLASS_TOLERANCE: f64 = 0.5;

/// Returns `true` if `output` is classified as `id`.
#[must_use]
pub fn matches_class(output: f64, id: f64) -> bool {
    (output - id).abs() < CLASS_TOLERANCE
}

/// A trained rule set with its output category labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classifier {
    name: Option<String>,
    membership: Vec<(String, f64)>,
    fis: RuleSet,
}

impl Classifier {
    #[must_use]
    pub fn new(fis: RuleSet, membership: Vec<(String, f64)>, name: Option<String>) -> Self {
        Self {
            name,
            membership,
            fis,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `(label, class id)` pairs in class order.
    #[must_use]
    pub fn membership(&self) -> &[(String, f64)] {
        &self.membership
    }

    #[must_use]
    pub fn fis(&self) -> &RuleSet {
        &self.fis
    }

    /// Maps a FIS output to the label of the class it falls into, if any.
    #[must_use]
    pub fn classify(&self, output: f64) -> Option<&str> {
        self.membership
            .iter()
            .find(|(_, id)| matches_class(output, *id))
            .map(|(label, _)| label.as_str())
    }

    /// Evaluates a stream of feature rows.
    ///
    /// For a sequential rule set every row is extended with the previous output (starting
    /// at `0.0`, with `NaN` reset to `0.0`); a batched rule set evaluates rows independently.
    /// Rows must have [`RuleSet::feature_width`] columns.
    pub fn evaluate_rows(&self, rows: &DMatrix<f64>) -> Result<Vec<f64>, RuleSetError> {
        self.fis.check_feature_width(rows)?;
        let outputs = match self.fis.mode() {
            EvaluationMode::Batched => self.fis.evaluates(rows),
            EvaluationMode::Sequential => {
                let mut last: f64 = 0.0;
                let mut buf = Vec::with_capacity(rows.ncols() + 1);
                rows.row_iter()
                    .map(|row| {
                        buf.clear();
                        buf.extend(row.iter().copied());
                        buf.push(if last.is_nan() { 0.0 } else { last });
                        last = self.fis.evaluate(&buf);
                        last
                    })
                    .collect()
            }
        };
        Ok(outputs)
    }
}

/// The ordered multi-classifier ensemble.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSet {
    classifiers: Vec<Classifier>,
}

impl ClassifierSet {
    #[must_use]
    pub fn new(classifiers: Vec<Classifier>) -> Self {
        Self { classifiers }
    }

    #[must_use]
    pub fn classifiers(&self) -> &[Classifier] {
        &self.classifiers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Classifier> {
        self.classifiers.iter().find(|c| c.name() == Some(name))
    }

    /// Runs every classifier over the same stream of rows, in ensemble order.
    pub fn evaluate_stream(&self, rows: &DMatrix<f64>) -> Result<Vec<Vec<f64>>, RuleSetError> {
        self.classifiers
            .iter()
            .map(|c| c.evaluate_rows(rows))
            .collect()
    }
}
