//! Training orchestration for fuzzy inference classifiers.
//!
//! A training run ([`training_state::TrainingState`]) owns one or more classifiers
//! ([`classifier_state::ClassifierState`]), each made of target classes
//! ([`class_state::ClassState`]). Every classifier is refined over a number of iterations:
//!
//! - seed centers are picked per class by subtractive clustering
//! - a genetic search ([`search`]) selects seed subsets, fits Gath-Geva clusters and linear
//!   consequents, and scores the resulting rule sets on held-out check rows
//! - the training rows get a feedback column filled with the outputs of the current FIS,
//!   in randomized buckets ([`adjust_map`]); from the second iteration on the feedback
//!   column is an input dimension
//! - the best rule set is optionally pruned by a bit-vector search
//!
//! # Example
//!
//! ```
//! use fistrain_training::{
//!     class_state::ClassState, parameter::TrainingParameter, training_state::TrainingState,
//! };
//! use nalgebra::DMatrix;
//!
//! let parameter = TrainingParameter {
//!     seed: Some(1),
//!     ..TrainingParameter::default()
//! };
//! let mut state = TrainingState::new(parameter).unwrap();
//! let class = ClassState::new(
//!     Some("only".to_owned()),
//!     1.0,
//!     DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 0.1, 0.2, 0.2, 0.1]),
//!     None,
//! )
//! .unwrap();
//! state.add_classifier("example", vec![class]).unwrap();
//! assert_eq!(state.normalization_range().unwrap().len(), 3);
//! ```

pub mod adjust_map;
pub mod class_state;
pub mod classifier_state;
pub mod genetic;
pub mod genome;
pub mod parameter;
pub mod search;
pub mod training_state;
