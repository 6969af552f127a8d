use std::path::PathBuf;

use anyhow::Context as _;
use fistrain_rules::classifier::matches_class;

use crate::{
    schema::{
        dataset::{self, Dataset},
        model::TrainedModel,
    },
    util,
};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    /// Trained model JSON file
    #[arg(long)]
    model: PathBuf,
    /// Dataset JSON file providing the check rows
    #[arg(long)]
    data: PathBuf,
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let EvaluateArg { model, data } = arg;
    let model = util::read_json_file::<TrainedModel, _>("model", model)?;
    let dataset = util::read_json_file::<Dataset, _>("dataset", data)?;

    println!("Model trained at {}", model.trained_at);
    for data in &dataset.classifiers {
        let classifier = model
            .classifiers
            .get(&data.name)
            .with_context(|| format!("Classifier {:?} not found in model", data.name))?;

        println!("{}:", data.name);
        let (mut correct, mut total) = (0, 0);
        for class in &data.classes {
            let Some(check) = &class.check else {
                continue;
            };
            let rows = dataset::rows_to_matrix(check)
                .with_context(|| format!("Invalid check rows of class {:?}", class.name))?;
            let outputs = classifier.evaluate_rows(&rows).with_context(|| {
                format!(
                    "Check rows of class {:?} do not fit classifier {:?}",
                    class.name, data.name
                )
            })?;
            let hits = outputs.iter().filter(|o| matches_class(**o, class.id)).count();
            println!(
                "  {:<16} {hits:>6} / {:<6} ({:.2}%)",
                class.name.as_deref().unwrap_or("-"),
                outputs.len(),
                percent(hits, outputs.len())
            );
            correct += hits;
            total += outputs.len();
        }
        println!(
            "  {:<16} {correct:>6} / {total:<6} ({:.2}%)",
            "total",
            percent(correct, total)
        );
    }
    Ok(())
}

fn percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[expect(clippy::cast_precision_loss)]
    let ratio = correct as f64 / total as f64;
    100.0 * ratio
}
