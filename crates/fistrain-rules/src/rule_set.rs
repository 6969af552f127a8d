//! Rule sets: the candidate FIS handled by training and genetic search.
//!
//! A [`RuleSet`] owns its rules, an active-rule mask (edited by bit-vector pruning), and an
//! [`EvaluationMode`] fixed when the set is built.
//!
//! # Evaluation Modes
//!
//! - [`EvaluationMode::Sequential`] - The rules were fitted on feedback-extended data: the
//!   last input dimension is the previous output of the same rule set. Check rows must be
//!   evaluated one at a time, carrying the output forward.
//! - [`EvaluationMode::Batched`] - The rules see features only; rows are independent and
//!   can be evaluated in one pass with [`RuleSet::evaluates`].

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::rule::ComplexRule;

/// How a rule set consumes its input rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant,
)]
pub enum EvaluationMode {
    /// The last input dimension is fed back from the previous output.
    Sequential,
    /// Rows are independent feature vectors.
    Batched,
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RuleSetError {
    #[display("rule set must contain at least one rule")]
    Empty,
    #[display("rule {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[display("active mask has {actual} entries, expected {expected}")]
    MaskLength { expected: usize, actual: usize },
    #[display("active mask must enable at least one rule")]
    NoActiveRule,
    #[display("rule {index} has inconsistent coefficient, center and precision shapes")]
    MalformedRule { index: usize },
    #[display("input rows have {actual} columns, expected {expected}")]
    InputWidth { expected: usize, actual: usize },
}

/// An ordered set of fuzzy rules forming one FIS candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRuleSet")]
pub struct RuleSet {
    rules: Vec<ComplexRule>,
    active: Vec<bool>,
    mode: EvaluationMode,
}

/// Serialized form of [`RuleSet`], validated on load.
#[derive(Deserialize)]
struct RawRuleSet {
    rules: Vec<ComplexRule>,
    active: Vec<bool>,
    mode: EvaluationMode,
}

impl TryFrom<RawRuleSet> for RuleSet {
    type Error = RuleSetError;

    fn try_from(raw: RawRuleSet) -> Result<Self, Self::Error> {
        if let Some(index) = raw.rules.iter().position(|r| !r.is_well_formed()) {
            return Err(RuleSetError::MalformedRule { index });
        }
        let mut rule_set = Self::new(raw.rules, raw.mode)?;
        rule_set.set_active_mask(&raw.active)?;
        Ok(rule_set)
    }
}

impl RuleSet {
    /// Creates a rule set with every rule active.
    pub fn new(rules: Vec<ComplexRule>, mode: EvaluationMode) -> Result<Self, RuleSetError> {
        let expected = rules.first().ok_or(RuleSetError::Empty)?.dimension();
        if let Some((index, rule)) = rules
            .iter()
            .enumerate()
            .find(|(_, r)| r.dimension() != expected)
        {
            return Err(RuleSetError::DimensionMismatch {
                index,
                expected,
                actual: rule.dimension(),
            });
        }
        let active = vec![true; rules.len()];
        Ok(Self {
            rules,
            active,
            mode,
        })
    }

    /// Input dimension expected by [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.rules[0].dimension()
    }

    #[must_use]
    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    /// Width of a feature row, without the feedback input of a sequential set.
    #[must_use]
    pub fn feature_width(&self) -> usize {
        match self.mode {
            EvaluationMode::Sequential => self.dimension().saturating_sub(1),
            EvaluationMode::Batched => self.dimension(),
        }
    }

    /// Checks that `rows` are feature rows this rule set can evaluate.
    pub fn check_feature_width(&self, rows: &DMatrix<f64>) -> Result<(), RuleSetError> {
        if rows.ncols() == self.feature_width() {
            Ok(())
        } else {
            Err(RuleSetError::InputWidth {
                expected: self.feature_width(),
                actual: rows.ncols(),
            })
        }
    }

    /// Total number of rules, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn rules(&self) -> &[ComplexRule] {
        &self.rules
    }

    #[must_use]
    pub fn active_mask(&self) -> &[bool] {
        &self.active
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    /// Replaces the active-rule mask.
    ///
    /// The mask must have one entry per rule and enable at least one rule.
    pub fn set_active_mask(&mut self, mask: &[bool]) -> Result<(), RuleSetError> {
        if mask.len() != self.rules.len() {
            return Err(RuleSetError::MaskLength {
                expected: self.rules.len(),
                actual: mask.len(),
            });
        }
        if !mask.contains(&true) {
            return Err(RuleSetError::NoActiveRule);
        }
        self.active.copy_from_slice(mask);
        Ok(())
    }

    /// Returns a copy of this rule set with a different active mask.
    pub fn with_active_mask(&self, mask: &[bool]) -> Result<Self, RuleSetError> {
        let mut rule_set = self.clone();
        rule_set.set_active_mask(mask)?;
        Ok(rule_set)
    }

    fn active_rules(&self) -> impl Iterator<Item = &ComplexRule> {
        self.rules
            .iter()
            .zip(&self.active)
            .filter_map(|(rule, active)| active.then_some(rule))
    }

    /// Evaluates the rule set on a single input vector.
    ///
    /// # Panics
    ///
    /// Panics if `x` does not have [`dimension`](Self::dimension) entries.
    #[must_use]
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        // weights are taken relative to the closest rule to avoid underflow
        let distances = self
            .active_rules()
            .map(|rule| rule.log_distance(x))
            .collect::<Vec<_>>();
        let nearest = distances.iter().copied().fold(f64::INFINITY, f64::min);
        if !nearest.is_finite() {
            return f64::NAN;
        }

        let mut weight_sum = 0.0;
        let mut output = 0.0;
        for (rule, distance) in self.active_rules().zip(&distances) {
            let weight = (nearest - distance).exp();
            weight_sum += weight;
            output += weight * rule.consequent(x);
        }
        output / weight_sum
    }

    /// Evaluates every row of `rows` independently.
    #[must_use]
    pub fn evaluates(&self, rows: &DMatrix<f64>) -> Vec<f64> {
        let mut buf = Vec::with_capacity(rows.ncols());
        rows.row_iter()
            .map(|row| {
                buf.clear();
                buf.extend(row.iter().copied());
                self.evaluate(&buf)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::DVector;

    use super::*;

    fn constant_rule(center: f64, value: f64) -> ComplexRule {
        ComplexRule::new(
            DVector::zeros(1),
            value,
            DVector::from_element(1, center),
            DMatrix::identity(1, 1),
        )
    }

    #[test]
    fn test_empty_rule_set_is_rejected() {
        assert_eq!(
            RuleSet::new(vec![], EvaluationMode::Batched),
            Err(RuleSetError::Empty)
        );
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let wide = ComplexRule::new(
            DVector::zeros(2),
            0.0,
            DVector::zeros(2),
            DMatrix::identity(2, 2),
        );
        let err = RuleSet::new(vec![constant_rule(0.0, 1.0), wide], EvaluationMode::Batched)
            .unwrap_err();
        assert_eq!(
            err,
            RuleSetError::DimensionMismatch {
                index: 1,
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn test_evaluate_blends_rules() {
        let rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        assert!((rule_set.evaluate(&[0.0]) - 1.0).abs() < 1e-6);
        assert!((rule_set.evaluate(&[10.0]) - 3.0).abs() < 1e-6);
        assert!((rule_set.evaluate(&[5.0]) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_far_input_follows_nearest_rule() {
        let rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        assert!((rule_set.evaluate(&[1.0e6]) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_input_yields_nan() {
        let rule_set = RuleSet::new(vec![constant_rule(0.0, 1.0)], EvaluationMode::Batched)
            .unwrap();
        assert!(rule_set.evaluate(&[f64::NAN]).is_nan());
    }

    #[test]
    fn test_active_mask_excludes_rules() {
        let mut rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        rule_set.set_active_mask(&[false, true]).unwrap();
        assert_eq!(rule_set.active_count(), 1);
        assert!((rule_set.evaluate(&[0.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_masks_are_rejected() {
        let mut rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        assert_eq!(
            rule_set.set_active_mask(&[true]),
            Err(RuleSetError::MaskLength {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            rule_set.set_active_mask(&[false, false]),
            Err(RuleSetError::NoActiveRule)
        );
        assert_eq!(rule_set.active_mask(), &[true, true]);
    }

    #[test]
    fn test_evaluates_matches_evaluate() {
        let rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        let rows = DMatrix::from_column_slice(3, 1, &[0.0, 5.0, 10.0]);
        let outputs = rule_set.evaluates(&rows);
        assert_eq!(outputs.len(), 3);
        for (i, output) in outputs.iter().enumerate() {
            assert!((output - rule_set.evaluate(&[rows[(i, 0)]])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_serde_keeps_mode_and_mask() {
        let mut rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Sequential,
        )
        .unwrap();
        rule_set.set_active_mask(&[true, false]).unwrap();
        let json = serde_json::to_string(&rule_set).unwrap();
        let restored: RuleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, rule_set);
        assert!(restored.mode().is_sequential());
    }

    #[test]
    fn test_serde_rejects_invalid_sets() {
        let err = serde_json::from_str::<RuleSet>(r#"{"rules":[],"active":[],"mode":"Batched"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("at least one rule"));

        let rule_set = RuleSet::new(
            vec![constant_rule(0.0, 1.0), constant_rule(10.0, 3.0)],
            EvaluationMode::Batched,
        )
        .unwrap();
        let mut value = serde_json::to_value(&rule_set).unwrap();
        value["active"] = serde_json::json!([false, false]);
        assert!(serde_json::from_value::<RuleSet>(value.clone()).is_err());
        value["active"] = serde_json::json!([true]);
        assert!(serde_json::from_value::<RuleSet>(value).is_err());

        let wide = ComplexRule::new(
            DVector::zeros(2),
            0.0,
            DVector::zeros(2),
            DMatrix::identity(2, 2),
        );
        let mut value = serde_json::to_value(&rule_set).unwrap();
        value["rules"][1] = serde_json::to_value(&wide).unwrap();
        assert!(serde_json::from_value::<RuleSet>(value).is_err());
    }

    #[test]
    fn test_serde_rejects_malformed_rule() {
        let rule_set = RuleSet::new(vec![constant_rule(0.0, 1.0)], EvaluationMode::Batched)
            .unwrap();
        let mut value = serde_json::to_value(&rule_set).unwrap();
        value["rules"][0]["coefficients"] = serde_json::to_value(DVector::<f64>::zeros(3)).unwrap();
        let err = serde_json::from_value::<RuleSet>(value).unwrap_err();
        assert!(err.to_string().contains("rule 0"));
    }

    #[test]
    fn test_feature_width_follows_mode() {
        let batched = RuleSet::new(vec![constant_rule(0.0, 1.0)], EvaluationMode::Batched)
            .unwrap();
        let sequential = RuleSet::new(vec![constant_rule(0.0, 1.0)], EvaluationMode::Sequential)
            .unwrap();
        assert_eq!(batched.feature_width(), 1);
        assert_eq!(sequential.feature_width(), 0);
        assert!(batched.check_feature_width(&DMatrix::zeros(2, 1)).is_ok());
        assert_eq!(
            batched.check_feature_width(&DMatrix::zeros(2, 3)),
            Err(RuleSetError::InputWidth {
                expected: 1,
                actual: 3
            })
        );
    }
}
