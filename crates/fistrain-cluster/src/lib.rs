//! Numeric collaborators for fuzzy classifier training.
//!
//! Training treats these algorithms as pluggable building blocks. This crate provides the
//! default implementations:
//!
//! - [`normalize`]: Column-wise min-max scaling
//! - [`subclust`]: Subtractive clustering, used to pick seed centers from training rows
//! - [`gath_geva`]: Fuzzy maximum-likelihood (Gath-Geva) clustering seeded by those centers
//! - [`regression`]: Weighted least-squares fit of one linear consequent per cluster
//!
//! All algorithms work on `nalgebra` matrices whose rows are samples.
//!
//! # Example
//!
//! ```
//! use fistrain_cluster::{gath_geva::gath_geva, normalize::normalize, subclust::subclust};
//! use nalgebra::DMatrix;
//!
//! let data = DMatrix::from_row_slice(6, 2, &[
//!     0.0, 0.1,  0.1, 0.0,  0.2, 0.1,
//!     5.0, 5.1,  5.1, 4.9,  4.9, 5.0,
//! ]);
//! let seeds = subclust(&normalize(&data));
//! assert_eq!(seeds.len(), 2);
//!
//! let fit = gath_geva(&data, &data.select_rows(seeds.iter())).unwrap();
//! assert_eq!(fit.means.len(), 2);
//! ```

pub mod gath_geva;
pub mod normalize;
pub mod regression;
pub mod subclust;

/// Errors raised by the clustering and regression algorithms.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ClusterError {
    #[display("input data has no rows")]
    EmptyData,
    #[display("no seed centers were supplied")]
    NoSeeds,
    #[display("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[display("cluster {cluster} has no members")]
    EmptyCluster { cluster: usize },
    #[display("covariance of cluster {cluster} is not positive definite")]
    SingularCovariance { cluster: usize },
    #[display("regression for cluster {cluster} is degenerate")]
    DegenerateRegression { cluster: usize },
}
