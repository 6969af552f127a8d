//! Subtractive clustering (Chiu, 1994).
//!
//! Every sample is a candidate center. Its potential is the sum of Gaussian contributions
//! from all samples within the cluster radius. The sample with the highest potential becomes
//! the first center; the potential around each accepted center is then reduced, and the
//! procedure repeats until the remaining potential is too low.
//!
//! # Acceptance Rule
//!
//! With `P₁` the potential of the first center and `Pₖ` the highest remaining potential:
//!
//! ```text
//! Pₖ > accept_ratio · P₁            → accept
//! Pₖ < reject_ratio · P₁            → stop
//! d_min / radius + Pₖ / P₁ ≥ 1       → accept (far enough from existing centers)
//! otherwise                          → discard this sample and try the next one
//! ```
//!
//! The algorithm is deterministic: ties are resolved in favor of the lower row index.
//! Data is expected to be normalized (e.g. with [`crate::normalize::normalize`]) so that
//! the radius is meaningful in every dimension.

use nalgebra::DMatrix;

/// Parameters of subtractive clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubclustParams {
    /// Neighborhood radius of a cluster center, in normalized units
    pub radius: f64,
    /// Ratio between the potential-reduction radius and `radius`
    pub squash_factor: f64,
    /// Potential ratio above which a candidate is always accepted
    pub accept_ratio: f64,
    /// Potential ratio below which the search stops
    pub reject_ratio: f64,
}

impl Default for SubclustParams {
    fn default() -> Self {
        Self {
            radius: 0.5,
            squash_factor: 1.25,
            accept_ratio: 0.5,
            reject_ratio: 0.15,
        }
    }
}

/// Runs subtractive clustering with default parameters and returns the selected row indices.
#[must_use]
pub fn subclust(data: &DMatrix<f64>) -> Vec<usize> {
    subclust_with(data, &SubclustParams::default())
}

/// Runs subtractive clustering and returns the selected row indices in selection order.
#[must_use]
pub fn subclust_with(data: &DMatrix<f64>, params: &SubclustParams) -> Vec<usize> {
    let n = data.nrows();
    if n == 0 {
        return vec![];
    }

    let alpha = 4.0 / params.radius.powi(2);
    let beta = 4.0 / (params.squash_factor * params.radius).powi(2);
    let dist2 = |i: usize, j: usize| (data.row(i) - data.row(j)).norm_squared();

    let mut potential = (0..n)
        .map(|i| (0..n).map(|j| (-alpha * dist2(i, j)).exp()).sum::<f64>())
        .collect::<Vec<_>>();

    let (first, first_potential) = argmax(&potential);
    let mut centers = vec![first];
    subtract(&mut potential, first, first_potential, beta, &dist2);

    // each iteration either accepts, discards or stops, so n rounds suffice
    for _ in 1..n {
        let (k, pk) = argmax(&potential);
        if pk <= 0.0 {
            break;
        }
        let accept = if pk > params.accept_ratio * first_potential {
            true
        } else if pk < params.reject_ratio * first_potential {
            break;
        } else {
            let d_min = centers
                .iter()
                .map(|&c| dist2(k, c).sqrt())
                .fold(f64::INFINITY, f64::min);
            d_min / params.radius + pk / first_potential >= 1.0
        };

        if accept {
            centers.push(k);
            subtract(&mut potential, k, pk, beta, &dist2);
        } else {
            potential[k] = 0.0;
        }
    }
    centers
}

fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}

fn subtract<F>(potential: &mut [f64], center: usize, center_potential: f64, beta: f64, dist2: &F)
where
    F: Fn(usize, usize) -> f64,
{
    for (i, p) in potential.iter_mut().enumerate() {
        *p -= center_potential * (-beta * dist2(i, center)).exp();
    }
}
