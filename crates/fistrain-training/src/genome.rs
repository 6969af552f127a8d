//! Bit-genome operations for the genetic searches.
//!
//! Both searches encode a candidate as a vector of bits:
//!
//! - FIS search: one bit per seed center (is this center used to seed Gath-Geva?)
//! - Rule pruning: one bit per rule (is this rule active?)
//!
//! A genome is split into *groups* (one per class for the FIS search, a single group for
//! rule pruning). Every group must keep at least one bit set, which [`repair`] enforces
//! after each genetic operation.
//!
//! # Operations
//!
//! - **Initialization**: [`random`] draws each bit independently
//! - **Crossover**: [`uniform_crossover`] takes each bit from either parent
//! - **Mutation**: [`mutate`] flips bits with a fixed probability
//! - **Repair**: [`repair`] re-enables one random bit in every empty group

use std::ops::Range;

use rand::Rng;

/// Creates a genome by applying a function to each index.
///
/// # Examples
///
/// ```
/// use fistrain_training::genome;
///
/// let genome = genome::from_fn(|i| i % 2 == 0, 4);
/// assert_eq!(genome, vec![true, false, true, false]);
/// ```
pub fn from_fn<F>(mut f: F, len: usize) -> Vec<bool>
where
    F: FnMut(usize) -> bool,
{
    let mut bits = Vec::with_capacity(len);
    for i in 0..len {
        bits.push(f(i));
    }
    bits
}

/// Generates a random genome where each bit is set with probability `density`.
pub fn random<R>(rng: &mut R, density: f64, len: usize) -> Vec<bool>
where
    R: Rng + ?Sized,
{
    from_fn(|_| rng.random_bool(density), len)
}

/// Uniform crossover: every bit is copied from a parent chosen with equal probability.
///
/// # Panics
///
/// Panics if parent genomes have different lengths.
pub fn uniform_crossover<R>(p1: &[bool], p2: &[bool], rng: &mut R) -> Vec<bool>
where
    R: Rng + ?Sized,
{
    assert_eq!(p1.len(), p2.len());
    from_fn(
        |i| if rng.random_bool(0.5) { p1[i] } else { p2[i] },
        p1.len(),
    )
}

/// Flips each bit with probability `rate`.
pub fn mutate<R>(genome: &mut [bool], rate: f64, rng: &mut R)
where
    R: Rng + ?Sized,
{
    for bit in genome {
        if rng.random_bool(rate) {
            *bit = !*bit;
        }
    }
}

/// Ensures every non-empty group has at least one bit set.
///
/// Empty ranges are skipped: there is nothing to enable.
pub fn repair<R>(genome: &mut [bool], groups: &[Range<usize>], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for group in groups {
        if group.is_empty() || genome[group.clone()].contains(&true) {
            continue;
        }
        let i = rng.random_range(group.clone());
        genome[i] = true;
    }
}
