//! Genetic algorithm over bit genomes.
//!
//! This module implements the generational loop shared by the FIS search and rule pruning
//! (see [`crate::search`]). Individuals are bit genomes (see [`crate::genome`]) scored by an
//! integer fitness: the number of correctly classified check rows.
//!
//! # Algorithm Overview
//!
//! 1. **Evaluate Fitness** - Score every individual with the caller's fitness function
//! 2. **Elite Selection** - Top performers are preserved unchanged in the next generation
//! 3. **Tournament Selection** - Select parents for reproduction using tournament selection
//! 4. **Uniform Crossover** - Combine two parents bit by bit
//! 5. **Mutation** - Flip random bits
//! 6. **Repair** - Re-enable a bit in every group left empty
//!
//! # Evaluation
//!
//! Evaluation is sequential: fitness functions borrow the training state and may be
//! expensive (each FIS candidate runs a full clustering + regression fit), so callers cache
//! by genome where useful.

use std::ops::Range;

use rand::{Rng, seq::IndexedRandom};

use crate::genome;

/// A single candidate: a bit genome and its fitness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    genome: Vec<bool>,
    fitness: usize,
}

impl Individual {
    #[must_use]
    pub fn new(genome: Vec<bool>) -> Self {
        Self { genome, fitness: 0 }
    }

    #[must_use]
    pub fn genome(&self) -> &[bool] {
        &self.genome
    }

    /// Fitness from the last evaluation (`0` before any evaluation).
    #[must_use]
    pub fn fitness(&self) -> usize {
        self.fitness
    }
}

/// Minimum, maximum and mean fitness of a population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

/// A population of bit genomes sharing the same group layout.
#[derive(Debug, Clone)]
pub struct Population {
    groups: Vec<Range<usize>>,
    individuals: Vec<Individual>,
}

impl Population {
    /// Creates a population of `count` individuals.
    ///
    /// The `seeded` genomes are inserted first (truncated to `count`); the remaining
    /// individuals are random. Every genome is repaired so that each group keeps at least
    /// one set bit.
    #[must_use]
    pub fn random<R>(
        groups: Vec<Range<usize>>,
        count: usize,
        seeded: Vec<Vec<bool>>,
        rng: &mut R,
    ) -> Self
    where
        R: Rng + ?Sized,
    {
        let len = groups.iter().map(|g| g.end).max().unwrap_or(0);
        let mut genomes = seeded;
        genomes.truncate(count);
        while genomes.len() < count {
            genomes.push(genome::random(rng, 0.5, len));
        }
        let individuals = genomes
            .into_iter()
            .map(|mut g| {
                assert_eq!(g.len(), len, "genome length must match group layout");
                genome::repair(&mut g, &groups, rng);
                Individual::new(g)
            })
            .collect();
        Self {
            groups,
            individuals,
        }
    }

    #[must_use]
    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    #[must_use]
    pub fn groups(&self) -> &[Range<usize>] {
        &self.groups
    }

    /// Evaluates every individual and sorts the population by fitness, best first.
    ///
    /// The sort is stable: among equal fitness the earlier individual stays ahead.
    pub fn evaluate_fitness<F>(&mut self, mut fitness: F)
    where
        F: FnMut(&[bool]) -> usize,
    {
        for ind in &mut self.individuals {
            ind.fitness = fitness(&ind.genome);
        }
        self.individuals.sort_by(|a, b| b.fitness.cmp(&a.fitness));
    }

    /// The best individual after the last [`evaluate_fitness`](Self::evaluate_fitness).
    #[must_use]
    pub fn best(&self) -> Option<&Individual> {
        self.individuals.first()
    }

    #[must_use]
    pub fn compute_fitness_stats(&self) -> Option<FitnessStats> {
        let min = self.individuals.iter().map(|i| i.fitness).min()?;
        let max = self.individuals.iter().map(|i| i.fitness).max()?;
        #[expect(clippy::cast_precision_loss)]
        let mean = self.individuals.iter().map(|i| i.fitness).sum::<usize>() as f64
            / self.individuals.len() as f64;
        Some(FitnessStats { min, max, mean })
    }
}

/// Controls how a population evolves from one generation to the next.
#[derive(Debug, Clone, Copy)]
pub struct PopulationEvolver {
    /// Number of top individuals preserved unchanged (elitism)
    pub elite_count: usize,
    /// Tournament size for selection (larger = stronger selection pressure)
    pub tournament_size: usize,
    /// Probability of flipping each bit of a child
    pub mutation_rate: f64,
}

impl PopulationEvolver {
    /// Evolves the population to create the next generation.
    ///
    /// The population must be sorted by fitness, best first (as left by
    /// [`Population::evaluate_fitness`]). The next generation has the same size.
    #[must_use]
    pub fn evolve<R>(&self, population: &Population, rng: &mut R) -> Population
    where
        R: Rng + ?Sized,
    {
        assert!(
            population
                .individuals
                .is_sorted_by(|a, b| a.fitness >= b.fitness)
        );

        let elite_count = self.elite_count.min(population.individuals.len());
        let mut next_individuals = population.individuals[..elite_count].to_vec();

        while next_individuals.len() < population.individuals.len() {
            let p1 = tournament_select(&population.individuals, self.tournament_size, rng);
            let p2 = tournament_select(&population.individuals, self.tournament_size, rng);

            let mut child = genome::uniform_crossover(&p1.genome, &p2.genome, rng);
            genome::mutate(&mut child, self.mutation_rate, rng);
            genome::repair(&mut child, &population.groups, rng);

            next_individuals.push(Individual::new(child));
        }

        Population {
            groups: population.groups.clone(),
            individuals: next_individuals,
        }
    }
}

/// Selects the fittest of `tournament_size` randomly chosen individuals.
fn tournament_select<'a, R>(
    population: &'a [Individual],
    tournament_size: usize,
    rng: &mut R,
) -> &'a Individual
where
    R: Rng + ?Sized,
{
    assert!(tournament_size > 0);
    population
        .choose_multiple(rng, tournament_size)
        .max_by_key(|ind| ind.fitness)
        .expect("population must not be empty")
}
