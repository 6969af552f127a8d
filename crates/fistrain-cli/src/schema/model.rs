use chrono::{DateTime, Utc};
use fistrain_rules::classifier::ClassifierSet;
use fistrain_training::parameter::TrainingParameter;
use serde::{Deserialize, Serialize};

/// A trained ensemble as written by `fistrain train`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrainedModel {
    pub trained_at: DateTime<Utc>,
    pub parameter: TrainingParameter,
    pub classifiers: ClassifierSet,
}
