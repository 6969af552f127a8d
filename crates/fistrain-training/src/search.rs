//! Genetic search over FIS candidates and rule subsets.
//!
//! Training hands two jobs to a [`FisSearch`] implementation:
//!
//! - [`FisSearch::evolve_fis`] - Find a good FIS given per-class seed centers, a candidate
//!   builder and a fitness function
//! - [`FisSearch::evolve_bitvec`] - Prune the rules of an already fitted FIS
//!
//! [`GeneticSearch`] is the default implementation. Tests drive the training loop with
//! their own implementations.
//!
//! # Candidate Contract
//!
//! Candidate construction and scoring never fail the search. A builder that cannot produce a
//! candidate returns [`CandidateOutcome::Unavailable`]; such genomes score zero and are never
//! returned. A fitness function that cannot score a candidate returns
//! [`Fitness::Failed`], which counts as zero.

use std::{collections::HashMap, ops::Range};

use fistrain_rules::rule_set::RuleSet;
use nalgebra::DMatrix;
use rand::Rng;
use tracing::debug;

use crate::{
    class_state::QualityError,
    classifier_state::FisError,
    genetic::{Population, PopulationEvolver},
};

const ELITE_COUNT: usize = 1;
const TOURNAMENT_SIZE: usize = 2;
const MIN_MUTATION_RATE: f64 = 0.01;

/// Outcome of building a FIS candidate from selected seed centers.
#[derive(Debug)]
pub enum CandidateOutcome {
    Built(RuleSet),
    Unavailable(FisError),
}

impl CandidateOutcome {
    #[must_use]
    pub fn into_candidate(self) -> Option<RuleSet> {
        match self {
            CandidateOutcome::Built(fis) => Some(fis),
            CandidateOutcome::Unavailable(_) => None,
        }
    }
}

/// Fitness of a FIS candidate: correctly classified check rows.
#[derive(Debug)]
pub enum Fitness {
    Scored(usize),
    Failed(QualityError),
}

impl Fitness {
    /// The score used for selection; a failed evaluation is the worst fitness.
    #[must_use]
    pub fn value(&self) -> usize {
        match self {
            Fitness::Scored(correct) => *correct,
            Fitness::Failed(_) => 0,
        }
    }
}

/// Candidate builder: selected seed centers (one matrix per class) to a FIS.
pub type CandidateBuilder<'a> = dyn FnMut(&[DMatrix<f64>]) -> CandidateOutcome + 'a;

/// Fitness function over FIS candidates.
pub type FitnessFn<'a> = dyn FnMut(&RuleSet) -> Fitness + 'a;

/// Search engines used by the training loop.
pub trait FisSearch {
    /// Searches for the best FIS seeded from `seeds` (one matrix of seed rows per class).
    ///
    /// Returns `None` when no viable candidate was found.
    fn evolve_fis(
        &mut self,
        seeds: &[DMatrix<f64>],
        build: &mut CandidateBuilder<'_>,
        fitness: &mut FitnessFn<'_>,
    ) -> Option<RuleSet>;

    /// Selects a subset of the rules of `fis` by editing its active mask in place.
    fn evolve_bitvec(
        &mut self,
        fis: &mut RuleSet,
        fitness: &mut FitnessFn<'_>,
        generations: usize,
        population: usize,
    );
}

/// Genetic implementation of [`FisSearch`].
#[derive(Debug, Clone)]
pub struct GeneticSearch<R> {
    generations: usize,
    population: usize,
    rng: R,
}

impl<R> GeneticSearch<R>
where
    R: Rng,
{
    /// Creates a search running `generations` generations of `population` individuals for
    /// [`evolve_fis`](FisSearch::evolve_fis).
    #[must_use]
    pub fn new(generations: usize, population: usize, rng: R) -> Self {
        Self {
            generations,
            population,
            rng,
        }
    }

    fn run<F>(
        &mut self,
        groups: Vec<Range<usize>>,
        seeded: Vec<Vec<bool>>,
        generations: usize,
        population: usize,
        mut fitness: F,
    ) where
        F: FnMut(&[bool]) -> usize,
    {
        let len = groups.iter().map(|g| g.end).max().unwrap_or(0);
        #[expect(clippy::cast_precision_loss)]
        let evolver = PopulationEvolver {
            elite_count: ELITE_COUNT,
            tournament_size: TOURNAMENT_SIZE,
            mutation_rate: (1.0 / len.max(1) as f64).max(MIN_MUTATION_RATE),
        };

        let mut pop = Population::random(groups, population, seeded, &mut self.rng);
        for generation in 0..generations {
            pop.evaluate_fitness(&mut fitness);
            if let Some(stats) = pop.compute_fitness_stats() {
                debug!(
                    generation,
                    min = stats.min,
                    max = stats.max,
                    mean = stats.mean,
                    "genetic search generation"
                );
            }
            if generation + 1 < generations {
                pop = evolver.evolve(&pop, &mut self.rng);
            }
        }
    }
}

impl<R> FisSearch for GeneticSearch<R>
where
    R: Rng,
{
    fn evolve_fis(
        &mut self,
        seeds: &[DMatrix<f64>],
        build: &mut CandidateBuilder<'_>,
        fitness: &mut FitnessFn<'_>,
    ) -> Option<RuleSet> {
        let mut groups = Vec::with_capacity(seeds.len());
        let mut start = 0;
        for seed in seeds {
            groups.push(start..start + seed.nrows());
            start += seed.nrows();
        }
        if start == 0 {
            return None;
        }

        let mut best: Option<(usize, RuleSet)> = None;
        let mut cache = HashMap::<Vec<bool>, usize>::new();
        let layout = groups.clone();
        let evaluate = |genome: &[bool]| {
            if let Some(score) = cache.get(genome) {
                return *score;
            }
            let selected = select_seeds(seeds, &layout, genome);
            let score = match build(&selected) {
                CandidateOutcome::Built(fis) => {
                    let score = fitness(&fis).value();
                    if best.as_ref().is_none_or(|(best, _)| score > *best) {
                        best = Some((score, fis));
                    }
                    score
                }
                CandidateOutcome::Unavailable(err) => {
                    debug!(%err, "candidate unavailable");
                    0
                }
            };
            cache.insert(genome.to_vec(), score);
            score
        };

        let (generations, population) = (self.generations, self.population);
        self.run(groups, vec![vec![true; start]], generations, population, evaluate);
        best.map(|(_, fis)| fis)
    }

    fn evolve_bitvec(
        &mut self,
        fis: &mut RuleSet,
        fitness: &mut FitnessFn<'_>,
        generations: usize,
        population: usize,
    ) {
        let current = fis.active_mask().to_vec();
        let mut best: Option<(usize, RuleSet)> = None;
        let evaluate = |genome: &[bool]| {
            let Ok(trial) = fis.with_active_mask(genome) else {
                return 0;
            };
            let score = fitness(&trial).value();
            if best.as_ref().is_none_or(|(best, _)| score > *best) {
                best = Some((score, trial));
            }
            score
        };

        self.run(
            vec![0..current.len()],
            vec![current.clone()],
            generations,
            population,
            evaluate,
        );

        if let Some((score, pruned)) = best
            && pruned.active_mask() != current.as_slice()
        {
            debug!(
                score,
                active = pruned.active_count(),
                total = pruned.len(),
                "pruned rule set"
            );
            *fis = pruned;
        }
    }
}

/// Keeps the seed rows whose genome bit is set, class by class.
fn select_seeds(
    seeds: &[DMatrix<f64>],
    groups: &[Range<usize>],
    genome: &[bool],
) -> Vec<DMatrix<f64>> {
    seeds
        .iter()
        .zip(groups)
        .map(|(seed, group)| {
            let rows = genome[group.clone()]
                .iter()
                .enumerate()
                .filter_map(|(i, selected)| selected.then_some(i))
                .collect::<Vec<_>>();
            seed.select_rows(rows.iter())
        })
        .collect()
}
