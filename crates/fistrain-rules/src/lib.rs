//! Fuzzy inference system (FIS) representation for the fistrain classifier trainer.
//!
//! This crate holds the artifacts that training produces and that inference consumes:
//!
//! - [`rule::ComplexRule`] - A single Takagi-Sugeno rule with a Gaussian antecedent
//!   (center + precision matrix) and a linear consequent
//! - [`rule_set::RuleSet`] - An ordered set of rules with an active-rule mask and a fixed
//!   [`rule_set::EvaluationMode`]
//! - [`classifier::Classifier`] / [`classifier::ClassifierSet`] - Named rule sets with
//!   class membership labels, assembled into an ordered ensemble
//! - [`builder::build_classifier`] - Assembles a rule set from fitted cluster parameters
//!   and regression coefficients
//!
//! # Evaluation
//!
//! A rule set maps a feature vector `x` to a scalar:
//!
//! ```text
//! activation_r(x) = exp(-½ (x - c_r)ᵀ P_r (x - c_r))
//! output(x)       = Σ_r activation_r(x) · (a_r · x + b_r) / Σ_r activation_r(x)
//! ```
//!
//! Only rules enabled in the active mask take part. Activations are normalized relative to
//! the strongest rule, so inputs far from every center still follow their nearest rule.
//! A `NaN` input yields a `NaN` output; callers that feed outputs back as inputs are
//! expected to reset `NaN`.
//!
//! A classifier reads the output as a class id: the output is "class `id`" when it lies
//! strictly within `0.5` of `id`.
//!
//! # Example
//!
//! ```
//! use fistrain_rules::{
//!     rule::ComplexRule,
//!     rule_set::{EvaluationMode, RuleSet},
//! };
//! use nalgebra::{DMatrix, DVector};
//!
//! // A rule that always answers 2.0, whatever the input
//! let rule = ComplexRule::new(
//!     DVector::zeros(2),
//!     2.0,
//!     DVector::zeros(2),
//!     DMatrix::identity(2, 2),
//! );
//! let rule_set = RuleSet::new(vec![rule], EvaluationMode::Batched).unwrap();
//! assert!((rule_set.evaluate(&[0.5, -1.0]) - 2.0).abs() < 1e-12);
//! ```

pub mod builder;
pub mod classifier;
pub mod rule;
pub mod rule_set;
