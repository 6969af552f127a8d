//! Training parameters and their configuration file form.
//!
//! The configuration is a nested JSON object in which every key is optional:
//!
//! ```json
//! {
//!   "fis_evolution": { "iterations": 1, "generations": 5, "population": 10 },
//!   "training_data": { "shuffle_size": 20 },
//!   "bitvec_evolution": { "enabled": true, "generations": 5, "population": 10 },
//!   "seed": 42
//! }
//! ```
//!
//! Missing keys keep the defaults of [`TrainingParameter::default`]. Unrecognized keys are
//! ignored, so the training settings can live in a larger configuration file.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ParameterError {
    #[display("{field} must be at least 1")]
    NotPositive { field: &'static str },
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ConfigError {
    #[display("invalid configuration JSON: {_0}")]
    Parse(serde_json::Error),
    #[display("invalid training parameter: {_0}")]
    Invalid(ParameterError),
}

/// Nested configuration mapping, every key optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub fis_evolution: FisEvolutionConfig,
    pub training_data: TrainingDataConfig,
    pub bitvec_evolution: BitvecEvolutionConfig,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisEvolutionConfig {
    pub iterations: Option<usize>,
    pub generations: Option<usize>,
    pub population: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingDataConfig {
    pub shuffle_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitvecEvolutionConfig {
    pub enabled: Option<bool>,
    pub generations: Option<usize>,
    pub population: Option<usize>,
}

/// Immutable settings of a training run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingParameter {
    /// Outer refinement iterations per classifier
    pub gg_iterations: usize,
    /// Generations of the FIS search
    pub gg_generations: usize,
    /// Population of the FIS search
    pub gg_population_size: usize,
    /// Rows per feedback adjustment bucket
    pub shuffle_size: usize,
    pub bitvec_enabled: bool,
    pub bitvec_generations: usize,
    pub bitvec_popsize: usize,
    /// Seed of the training RNG; `None` draws one from the OS
    pub seed: Option<u64>,
}

impl Default for TrainingParameter {
    fn default() -> Self {
        Self {
            gg_iterations: 1,
            gg_generations: 5,
            gg_population_size: 10,
            shuffle_size: 20,
            bitvec_enabled: true,
            bitvec_generations: 5,
            bitvec_popsize: 10,
            seed: None,
        }
    }
}

impl TrainingParameter {
    /// Applies a configuration over the defaults and validates the result.
    ///
    /// # Examples
    ///
    /// ```
    /// use fistrain_training::parameter::{TrainingConfig, TrainingParameter};
    ///
    /// let mut config = TrainingConfig::default();
    /// config.fis_evolution.iterations = Some(3);
    /// let parameter = TrainingParameter::from_config(&config).unwrap();
    /// assert_eq!(parameter.gg_iterations, 3);
    /// assert_eq!(parameter.gg_generations, 5);
    /// ```
    pub fn from_config(config: &TrainingConfig) -> Result<Self, ParameterError> {
        let default = Self::default();
        let parameter = Self {
            gg_iterations: config
                .fis_evolution
                .iterations
                .unwrap_or(default.gg_iterations),
            gg_generations: config
                .fis_evolution
                .generations
                .unwrap_or(default.gg_generations),
            gg_population_size: config
                .fis_evolution
                .population
                .unwrap_or(default.gg_population_size),
            shuffle_size: config
                .training_data
                .shuffle_size
                .unwrap_or(default.shuffle_size),
            bitvec_enabled: config
                .bitvec_evolution
                .enabled
                .unwrap_or(default.bitvec_enabled),
            bitvec_generations: config
                .bitvec_evolution
                .generations
                .unwrap_or(default.bitvec_generations),
            bitvec_popsize: config
                .bitvec_evolution
                .population
                .unwrap_or(default.bitvec_popsize),
            seed: config.seed,
        };
        parameter.validate()?;
        Ok(parameter)
    }

    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config = serde_json::from_str::<TrainingConfig>(json)?;
        Ok(Self::from_config(&config)?)
    }

    /// Checks that every count is at least 1.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let counts = [
            ("fis_evolution.iterations", self.gg_iterations),
            ("fis_evolution.generations", self.gg_generations),
            ("fis_evolution.population", self.gg_population_size),
            ("training_data.shuffle_size", self.shuffle_size),
            ("bitvec_evolution.generations", self.bitvec_generations),
            ("bitvec_evolution.population", self.bitvec_popsize),
        ];
        match counts.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ParameterError::NotPositive { field: *field }),
            None => Ok(()),
        }
    }
}
