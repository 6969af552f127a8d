//! A single fuzzy rule with a Gaussian antecedent and a linear consequent.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A Takagi-Sugeno rule.
///
/// The antecedent is a multivariate Gaussian membership centered at `center` with the
/// given `precision` (inverse covariance). The consequent is the affine function
/// `coefficients · x + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexRule {
    coefficients: DVector<f64>,
    intercept: f64,
    center: DVector<f64>,
    precision: DMatrix<f64>,
}

impl ComplexRule {
    /// Creates a new rule.
    ///
    /// # Panics
    ///
    /// Panics if the coefficient vector, the center, and the precision matrix do not
    /// agree on the input dimension.
    #[must_use]
    pub fn new(
        coefficients: DVector<f64>,
        intercept: f64,
        center: DVector<f64>,
        precision: DMatrix<f64>,
    ) -> Self {
        let dim = center.len();
        assert_eq!(coefficients.len(), dim, "coefficient length must match center");
        assert_eq!(
            precision.shape(),
            (dim, dim),
            "precision must be a square matrix matching center"
        );
        Self {
            coefficients,
            intercept,
            center,
            precision,
        }
    }

    /// Whether coefficients, center and precision agree on the dimension.
    ///
    /// Always true for rules made by [`new`](Self::new); deserialized rules are checked
    /// with it.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let dim = self.center.len();
        self.coefficients.len() == dim && self.precision.shape() == (dim, dim)
    }

    /// Input dimension of the rule.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.center.len()
    }

    #[must_use]
    pub fn coefficients(&self) -> &DVector<f64> {
        &self.coefficients
    }

    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    #[must_use]
    pub fn center(&self) -> &DVector<f64> {
        &self.center
    }

    #[must_use]
    pub fn precision(&self) -> &DMatrix<f64> {
        &self.precision
    }

    /// Half the squared Mahalanobis distance of `x` from the rule center.
    ///
    /// This is the negated log of [`activation`](Self::activation); rule sets use it to
    /// normalize activations without underflowing.
    #[must_use]
    pub fn log_distance(&self, x: &[f64]) -> f64 {
        assert_eq!(x.len(), self.dimension(), "input dimension mismatch");
        let diff = DVector::from_iterator(
            x.len(),
            x.iter().zip(self.center.iter()).map(|(x, c)| x - c),
        );
        0.5 * diff.dot(&(&self.precision * &diff))
    }

    /// Degree to which `x` fires this rule, in `[0, 1]` for a positive semidefinite precision.
    #[must_use]
    pub fn activation(&self, x: &[f64]) -> f64 {
        (-self.log_distance(x)).exp()
    }

    /// Value of the linear consequent at `x`.
    #[must_use]
    pub fn consequent(&self, x: &[f64]) -> f64 {
        assert_eq!(x.len(), self.dimension(), "input dimension mismatch");
        self.coefficients
            .iter()
            .zip(x)
            .map(|(a, x)| a * x)
            .sum::<f64>()
            + self.intercept
    }
}
