//! Linear consequent fitting.
//!
//! Each fitted cluster becomes a rule whose output is an affine function of the input. The
//! consequent of cluster `r` is found by weighted least squares over the pooled training
//! rows of *all* classes, where the target of a row is its class id and its weight is the
//! normalized membership of the row in cluster `r`:
//!
//! ```text
//! βᵣ(x) = exp(-½ (x - vᵣ)ᵀ Fᵣ⁻¹ (x - vᵣ)) / Σₛ exp(-½ (x - vₛ)ᵀ Fₛ⁻¹ (x - vₛ))
//! θᵣ    = argmin Σₓ βᵣ(x) (y(x) - θᵣ · [x, 1])²
//! ```
//!
//! A tiny ridge term keeps the normal equations solvable when a cluster only weights a
//! handful of rows.

use nalgebra::{DMatrix, DVector};

use crate::ClusterError;

const RIDGE: f64 = 1e-9;

/// Fits one linear consequent per cluster.
///
/// `means[c]` and `covariances[c]` hold the clusters of class `c`; `targets` pairs each
/// class id with that class's training rows. Returns, for every class, a matrix with one
/// row per cluster and `dim + 1` columns, the last column being the intercept.
pub fn linear_regression(
    means: &[Vec<DVector<f64>>],
    covariances: &[Vec<DMatrix<f64>>],
    targets: &[(f64, &DMatrix<f64>)],
) -> Result<Vec<DMatrix<f64>>, ClusterError> {
    let dim = means
        .iter()
        .flatten()
        .next()
        .ok_or(ClusterError::NoSeeds)?
        .len();
    if let Some((_, data)) = targets.iter().find(|(_, d)| d.ncols() != dim) {
        return Err(ClusterError::DimensionMismatch {
            expected: dim,
            actual: data.ncols(),
        });
    }
    if targets.iter().all(|(_, d)| d.nrows() == 0) {
        return Err(ClusterError::EmptyData);
    }

    let mut centers = vec![];
    let mut precisions = vec![];
    for (cluster, (mean, covariance)) in means
        .iter()
        .flatten()
        .zip(covariances.iter().flatten())
        .enumerate()
    {
        if mean.len() != dim {
            return Err(ClusterError::DimensionMismatch {
                expected: dim,
                actual: mean.len(),
            });
        }
        let precision = covariance
            .clone()
            .try_inverse()
            .ok_or(ClusterError::SingularCovariance { cluster })?;
        centers.push(mean);
        precisions.push(precision);
    }

    // normal equations per cluster: A θ = b with A = Σ β z zᵀ, b = Σ β y z, z = [x, 1]
    let mut normal_matrices = vec![DMatrix::<f64>::zeros(dim + 1, dim + 1); centers.len()];
    let mut normal_vectors = vec![DVector::<f64>::zeros(dim + 1); centers.len()];
    let mut log_activation = vec![0.0; centers.len()];
    for (target, data) in targets {
        for row in data.row_iter() {
            let z = DVector::from_iterator(dim + 1, row.iter().copied().chain([1.0]));
            let x = z.rows(0, dim);
            for (r, (center, precision)) in centers.iter().zip(&precisions).enumerate() {
                let diff = &x - *center;
                log_activation[r] = -0.5 * diff.dot(&(precision * &diff));
            }
            let max = log_activation
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            let total = log_activation.iter().map(|l| (l - max).exp()).sum::<f64>();
            if !max.is_finite() || !total.is_finite() {
                continue;
            }
            let zzt = &z * z.transpose();
            for (r, log) in log_activation.iter().enumerate() {
                let beta = (log - max).exp() / total;
                normal_matrices[r] += &zzt * beta;
                normal_vectors[r] += &z * (beta * target);
            }
        }
    }

    let mut thetas = normal_matrices
        .into_iter()
        .zip(normal_vectors)
        .enumerate()
        .map(|(cluster, (mut a, b))| {
            for i in 0..=dim {
                a[(i, i)] += RIDGE;
            }
            a.lu()
                .solve(&b)
                .filter(|theta| theta.iter().all(|v| v.is_finite()))
                .ok_or(ClusterError::DegenerateRegression { cluster })
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();

    Ok(means
        .iter()
        .map(|class_means| {
            let rows = class_means
                .iter()
                .map(|_| thetas.next().map(|t| t.transpose()))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default();
            if rows.is_empty() {
                DMatrix::zeros(0, dim + 1)
            } else {
                DMatrix::from_rows(&rows)
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_class_targets() {
        let low = DMatrix::from_row_slice(4, 1, &[0.0, 0.1, 0.2, 0.3]);
        let high = DMatrix::from_row_slice(4, 1, &[5.0, 5.1, 5.2, 5.3]);
        let means = vec![
            vec![DVector::from_element(1, 0.15)],
            vec![DVector::from_element(1, 5.15)],
        ];
        let covariances = vec![
            vec![DMatrix::from_element(1, 1, 0.02)],
            vec![DMatrix::from_element(1, 1, 0.02)],
        ];
        let regressions =
            linear_regression(&means, &covariances, &[(1.0, &low), (2.0, &high)]).unwrap();

        assert_eq!(regressions.len(), 2);
        assert_eq!(regressions[0].shape(), (1, 2));
        assert_eq!(regressions[1].shape(), (1, 2));
        // each cluster only sees its own class, so the fit is the constant class id
        let predict = |theta: &DMatrix<f64>, x: f64| theta[(0, 0)] * x + theta[(0, 1)];
        assert!((predict(&regressions[0], 0.15) - 1.0).abs() < 1e-3);
        assert!((predict(&regressions[1], 5.15) - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_rows_per_class_follow_cluster_count() {
        let data = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.5, 2.0, 0.0]);
        let means = vec![vec![
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![2.0, 1.0]),
        ]];
        let covariances = vec![vec![DMatrix::identity(2, 2), DMatrix::identity(2, 2)]];
        let regressions = linear_regression(&means, &covariances, &[(3.0, &data)]).unwrap();
        assert_eq!(regressions[0].shape(), (2, 3));
    }

    #[test]
    fn test_singular_covariance() {
        let data = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        let means = vec![vec![DVector::from_element(1, 0.5)]];
        let covariances = vec![vec![DMatrix::zeros(1, 1)]];
        assert_eq!(
            linear_regression(&means, &covariances, &[(1.0, &data)]).unwrap_err(),
            ClusterError::SingularCovariance { cluster: 0 }
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let means = vec![vec![DVector::from_element(1, 0.5)]];
        let covariances = vec![vec![DMatrix::identity(1, 1)]];
        assert!(matches!(
            linear_regression(&means, &covariances, &[(1.0, &data)]),
            Err(ClusterError::DimensionMismatch { .. })
        ));
    }
}
