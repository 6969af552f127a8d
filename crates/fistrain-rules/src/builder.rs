//! Assembly of a rule set from fitted cluster parameters.
//!
//! Every fitted cluster becomes one rule:
//!
//! - center = cluster mean
//! - precision = inverse of the cluster covariance
//! - consequent = regression row (all but the last column are coefficients, the last column
//!   is the intercept)
//!
//! The inputs are parallel per-class sequences; rules are emitted class by class in cluster
//! order.

use nalgebra::{DMatrix, DVector};

use crate::{
    rule::ComplexRule,
    rule_set::{EvaluationMode, RuleSet, RuleSetError},
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BuildError {
    #[display("got {means} mean sets, {covariances} covariance sets and {regressions} regressions")]
    ClassCountMismatch {
        means: usize,
        covariances: usize,
        regressions: usize,
    },
    #[display("class {class}: cluster counts disagree between means, covariances and regression")]
    ClusterCountMismatch { class: usize },
    #[display("class {class}, cluster {cluster}: regression row has {actual} columns, expected {expected}")]
    RegressionWidth {
        class: usize,
        cluster: usize,
        expected: usize,
        actual: usize,
    },
    #[display("class {class}, cluster {cluster}: covariance matrix is singular")]
    SingularCovariance { class: usize, cluster: usize },
    #[display("invalid rule set: {_0}")]
    RuleSet(RuleSetError),
}

/// Builds one rule per fitted cluster.
///
/// `means[c][k]`, `covariances[c][k]` and row `k` of `regressions[c]` describe cluster `k`
/// of class `c`.
pub fn build_classifier(
    means: &[Vec<DVector<f64>>],
    covariances: &[Vec<DMatrix<f64>>],
    regressions: &[DMatrix<f64>],
    mode: EvaluationMode,
) -> Result<RuleSet, BuildError> {
    if means.len() != covariances.len() || means.len() != regressions.len() {
        return Err(BuildError::ClassCountMismatch {
            means: means.len(),
            covariances: covariances.len(),
            regressions: regressions.len(),
        });
    }

    let mut rules = vec![];
    for (class, ((means, covariances), regression)) in
        means.iter().zip(covariances).zip(regressions).enumerate()
    {
        if means.len() != covariances.len() || means.len() != regression.nrows() {
            return Err(BuildError::ClusterCountMismatch { class });
        }
        for (cluster, (mean, covariance)) in means.iter().zip(covariances).enumerate() {
            let dim = mean.len();
            if regression.ncols() != dim + 1 {
                return Err(BuildError::RegressionWidth {
                    class,
                    cluster,
                    expected: dim + 1,
                    actual: regression.ncols(),
                });
            }
            let precision = covariance
                .clone()
                .try_inverse()
                .ok_or(BuildError::SingularCovariance { class, cluster })?;
            let row = regression.row(cluster);
            let coefficients = DVector::from_iterator(dim, row.iter().take(dim).copied());
            rules.push(ComplexRule::new(
                coefficients,
                row[dim],
                mean.clone(),
                precision,
            ));
        }
    }
    RuleSet::new(rules, mode).map_err(BuildError::RuleSet)
}
