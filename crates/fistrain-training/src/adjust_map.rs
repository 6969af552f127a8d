//! Randomized bucket schedule for feedback adjustment.
//!
//! Every class's training rows are cut into contiguous buckets of `bulk_size` rows (the
//! last bucket of a class may be shorter). Buckets are then dealt in random class order:
//! at each step a class that still has rows left is picked uniformly at random and its
//! next bucket is emitted. Boundaries depend only on the class sizes and `bulk_size`; only
//! the visiting order is random.
//!
//! The schedule is built once per classifier and reused by every training iteration.

use rand::{Rng, seq::IndexedRandom};

/// One contiguous run of training rows of a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bucket {
    pub class_index: usize,
    pub start: usize,
    pub size: usize,
}

/// An ordered, exhaustive partition of every class's training rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustMap {
    buckets: Vec<Bucket>,
}

impl AdjustMap {
    /// Deals buckets for classes with `sizes[i]` training rows each.
    ///
    /// Classes without rows get no bucket.
    ///
    /// # Panics
    ///
    /// Panics if `bulk_size` is zero.
    #[must_use]
    pub fn deal<R>(sizes: &[usize], bulk_size: usize, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        assert!(bulk_size > 0, "bulk size must be positive");

        let mut offsets = vec![0; sizes.len()];
        let mut remaining = (0..sizes.len())
            .filter(|i| sizes[*i] > 0)
            .collect::<Vec<_>>();
        let mut buckets = vec![];
        while let Some(&class_index) = remaining.choose(rng) {
            let start = offsets[class_index] * bulk_size;
            let size = if start + bulk_size >= sizes[class_index] {
                remaining.retain(|i| *i != class_index);
                sizes[class_index] - start
            } else {
                bulk_size
            };
            buckets.push(Bucket {
                class_index,
                start,
                size,
            });
            offsets[class_index] += 1;
        }
        Self { buckets }
    }

    /// Buckets in visiting order.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
