use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use fistrain_training::{
    parameter::{TrainingConfig, TrainingParameter},
    training_state::TrainingState,
};
use tracing::info;

use crate::{
    schema::{dataset::Dataset, model::TrainedModel},
    util::{self, Output},
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Dataset JSON file
    #[arg(long)]
    data: PathBuf,
    /// Training configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
    /// Seed of the training RNG, overrides the configuration
    #[arg(long)]
    seed: Option<u64>,
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        data,
        config,
        output,
        seed,
    } = arg;

    let config = match config {
        Some(path) => util::read_json_file::<TrainingConfig, _>("config", path)?,
        None => TrainingConfig::default(),
    };
    let mut parameter =
        TrainingParameter::from_config(&config).context("Invalid training configuration")?;
    if seed.is_some() {
        parameter.seed = *seed;
    }
    let dataset = util::read_json_file::<Dataset, _>("dataset", data)?;

    let mut state = TrainingState::new(parameter.clone())?;
    for classifier in &dataset.classifiers {
        let classes = classifier.to_class_states()?;
        state
            .add_classifier(&classifier.name, classes)
            .with_context(|| format!("Invalid classifier {:?}", classifier.name))?;
        info!(
            classifier = %classifier.name,
            classes = classifier.classes.len(),
            "classifier loaded"
        );
    }

    let mut report = |progress: f64| info!("progress: {:.1}%", 100.0 * progress);
    let classifiers = state
        .build_fis(Some(&mut report))
        .context("Training failed: no viable FIS was found")?;

    let model = TrainedModel {
        trained_at: Utc::now(),
        parameter,
        classifiers,
    };
    Output::save_json(&model, output.clone())?;

    eprintln!();
    eprintln!("Model saved successfully");
    if let Some(path) = &output {
        eprintln!("  Path: {}", path.display());
    }
    eprintln!("  Trained at: {}", model.trained_at);
    for classifier in model.classifiers.classifiers() {
        eprintln!(
            "  {}: {} of {} rules active",
            classifier.name().unwrap_or("-"),
            classifier.fis().active_count(),
            classifier.fis().len()
        );
    }

    Ok(())
}
