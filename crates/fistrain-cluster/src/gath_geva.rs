//! Gath-Geva fuzzy maximum-likelihood clustering.
//!
//! Starting from seed centers, the algorithm alternates between estimating per-cluster
//! Gaussian parameters from fuzzy memberships and recomputing memberships from an
//! exponential distance:
//!
//! ```text
//! wᵢₖ    = uᵢₖ^m
//! vᵢ     = Σₖ wᵢₖ xₖ / Σₖ wᵢₖ
//! Fᵢ     = Σₖ wᵢₖ (xₖ - vᵢ)(xₖ - vᵢ)ᵀ / Σₖ wᵢₖ
//! Pᵢ     = Σₖ uᵢₖ / N
//! D²ᵢₖ   = √det(Fᵢ) / Pᵢ · exp(½ (xₖ - vᵢ)ᵀ Fᵢ⁻¹ (xₖ - vᵢ))
//! uᵢₖ    = 1 / Σⱼ (D²ᵢₖ / D²ⱼₖ)^(1/(m-1))
//! ```
//!
//! The exponential distance overflows easily, so memberships are computed from `ln D²`
//! with a log-sum-exp normalization. The first memberships come from one fuzzy c-means
//! step around the seeds (Euclidean distance).

use nalgebra::{DMatrix, DVector};

use crate::ClusterError;

/// Parameters of the Gath-Geva iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GathGevaParams {
    /// Fuzzifier `m` (> 1)
    pub fuzzifier: f64,
    /// Stop when no membership changes by more than this
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Added to the covariance diagonal to keep flat dimensions invertible
    pub regularization: f64,
}

impl Default for GathGevaParams {
    fn default() -> Self {
        Self {
            fuzzifier: 2.0,
            tolerance: 1e-6,
            max_iterations: 100,
            regularization: 1e-8,
        }
    }
}

/// Result of a Gath-Geva fit.
#[derive(Debug, Clone)]
pub struct GathGevaFit {
    /// Membership of every sample (columns) in every cluster (rows)
    pub memberships: DMatrix<f64>,
    /// A priori probability of each cluster
    pub priors: Vec<f64>,
    pub means: Vec<DVector<f64>>,
    pub covariances: Vec<DMatrix<f64>>,
    /// Number of membership updates performed
    pub iterations: usize,
}

/// Fits Gath-Geva clusters to the rows of `data`, seeded by the rows of `seeds`.
pub fn gath_geva(data: &DMatrix<f64>, seeds: &DMatrix<f64>) -> Result<GathGevaFit, ClusterError> {
    gath_geva_with(data, seeds, &GathGevaParams::default())
}

/// Like [`gath_geva`], with explicit parameters.
pub fn gath_geva_with(
    data: &DMatrix<f64>,
    seeds: &DMatrix<f64>,
    params: &GathGevaParams,
) -> Result<GathGevaFit, ClusterError> {
    if data.nrows() == 0 {
        return Err(ClusterError::EmptyData);
    }
    if seeds.nrows() == 0 {
        return Err(ClusterError::NoSeeds);
    }
    if seeds.ncols() != data.ncols() {
        return Err(ClusterError::DimensionMismatch {
            expected: data.ncols(),
            actual: seeds.ncols(),
        });
    }

    let exponent = 1.0 / (params.fuzzifier - 1.0);
    let mut memberships = DMatrix::from_fn(seeds.nrows(), data.nrows(), |i, k| {
        // fuzzy c-means: uᵢₖ ∝ (1/d²ᵢₖ)^(1/(m-1)), in log space
        -exponent * (data.row(k) - seeds.row(i)).norm_squared().ln()
    });
    normalize_log_memberships(&mut memberships);

    let mut iterations = 0;
    loop {
        let clusters = estimate(data, &memberships, params)?;
        let mut next = DMatrix::from_fn(seeds.nrows(), data.nrows(), |i, k| {
            -exponent * clusters[i].log_distance(&data.row(k).transpose())
        });
        normalize_log_memberships(&mut next);
        iterations += 1;

        let delta = (&next - &memberships).amax();
        memberships = next;
        if delta < params.tolerance || iterations >= params.max_iterations {
            break;
        }
    }

    let clusters = estimate(data, &memberships, params)?;
    let (means, (covariances, priors)) = clusters
        .into_iter()
        .map(|c| (c.mean, (c.covariance, c.prior)))
        .unzip();
    Ok(GathGevaFit {
        memberships,
        priors,
        means,
        covariances,
        iterations,
    })
}

#[derive(Debug)]
struct Cluster {
    mean: DVector<f64>,
    covariance: DMatrix<f64>,
    inverse: DMatrix<f64>,
    log_det: f64,
    prior: f64,
}

impl Cluster {
    /// `ln D²` for sample `x`.
    fn log_distance(&self, x: &DVector<f64>) -> f64 {
        let diff = x - &self.mean;
        0.5 * self.log_det - self.prior.ln() + 0.5 * diff.dot(&(&self.inverse * &diff))
    }
}

fn estimate(
    data: &DMatrix<f64>,
    memberships: &DMatrix<f64>,
    params: &GathGevaParams,
) -> Result<Vec<Cluster>, ClusterError> {
    #[expect(clippy::cast_precision_loss)]
    let n = data.nrows() as f64;
    let dim = data.ncols();

    memberships
        .row_iter()
        .enumerate()
        .map(|(cluster, u)| {
            let weights = u.map(|u| u.powf(params.fuzzifier));
            let weight_sum = weights.sum();
            if weight_sum.is_nan() || weight_sum <= 0.0 {
                return Err(ClusterError::EmptyCluster { cluster });
            }

            let mean = (data.transpose() * weights.transpose()) / weight_sum;
            let mut covariance = DMatrix::zeros(dim, dim);
            for (k, row) in data.row_iter().enumerate() {
                let diff = row.transpose() - &mean;
                covariance += (&diff * diff.transpose()) * weights[k];
            }
            covariance /= weight_sum;
            for i in 0..dim {
                covariance[(i, i)] += params.regularization;
            }

            let cholesky = covariance
                .clone()
                .cholesky()
                .ok_or(ClusterError::SingularCovariance { cluster })?;
            let log_det = 2.0 * cholesky.l().diagonal().map(f64::ln).sum();
            let inverse = cholesky.inverse();
            let prior = u.sum() / n;
            if !log_det.is_finite() || prior.is_nan() || prior <= 0.0 {
                return Err(ClusterError::SingularCovariance { cluster });
            }

            Ok(Cluster {
                mean,
                covariance,
                inverse,
                log_det,
                prior,
            })
        })
        .collect()
}

/// Turns per-cluster log-weights (rows) into memberships summing to 1 in every column.
///
/// A column containing `+∞` (a sample sitting on a center) gets full membership in that
/// cluster.
fn normalize_log_memberships(log_weights: &mut DMatrix<f64>) {
    for mut column in log_weights.column_iter_mut() {
        let max = column.max();
        if max == f64::INFINITY {
            column.apply(|v| *v = if *v == f64::INFINITY { 1.0 } else { 0.0 });
        } else {
            column.apply(|v| *v = (*v - max).exp());
        }
        let sum = column.sum();
        column /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> DMatrix<f64> {
        DMatrix::from_row_slice(
            8,
            2,
            &[
                0.0, 0.0, 0.2, 0.1, 0.1, 0.3, -0.1, 0.1, //
                5.0, 5.0, 5.2, 4.9, 4.8, 5.1, 5.1, 5.2,
            ],
        )
    }

    #[test]
    fn test_means_follow_blobs() {
        let data = two_blobs();
        let seeds = DMatrix::from_row_slice(2, 2, &[0.5, 0.5, 4.5, 4.5]);
        let fit = gath_geva(&data, &seeds).unwrap();

        assert_eq!(fit.means.len(), 2);
        assert_eq!(fit.covariances.len(), 2);
        assert!(fit.means[0].norm() < 0.5);
        assert!((&fit.means[1] - DVector::from_vec(vec![5.0, 5.0])).norm() < 0.5);
        assert!((fit.priors.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_memberships_sum_to_one() {
        let data = two_blobs();
        let seeds = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 5.0, 5.0]);
        let fit = gath_geva(&data, &seeds).unwrap();
        for column in fit.memberships.column_iter() {
            assert!((column.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_seed_on_sample() {
        // seeds coincide with samples: the first step must not produce NaN
        let data = two_blobs();
        let seeds = data.select_rows([0, 4].iter());
        let fit = gath_geva(&data, &seeds).unwrap();
        assert!(fit.memberships.iter().all(|u| u.is_finite()));
    }

    #[test]
    fn test_rejects_bad_input() {
        let data = two_blobs();
        assert_eq!(
            gath_geva(&DMatrix::zeros(0, 2), &data).unwrap_err(),
            ClusterError::EmptyData
        );
        assert_eq!(
            gath_geva(&data, &DMatrix::zeros(0, 2)).unwrap_err(),
            ClusterError::NoSeeds
        );
        assert_eq!(
            gath_geva(&data, &DMatrix::zeros(1, 3)).unwrap_err(),
            ClusterError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_nan_data_fails() {
        let mut data = two_blobs();
        data[(0, 0)] = f64::NAN;
        let seeds = DMatrix::from_row_slice(1, 2, &[0.0, 0.0]);
        assert!(gath_geva(&data, &seeds).is_err());
    }
}
