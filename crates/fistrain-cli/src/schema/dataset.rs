use anyhow::Context as _;
use fistrain_training::class_state::ClassState;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Training input: one entry per classifier, trained in file order.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Dataset {
    pub classifiers: Vec<ClassifierData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierData {
    pub name: String,
    pub classes: Vec<ClassData>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassData {
    /// Output label; unnamed classes take part in training but are not reported
    #[serde(default)]
    pub name: Option<String>,
    pub id: f64,
    pub training: Vec<Vec<f64>>,
    #[serde(default)]
    pub check: Option<Vec<Vec<f64>>>,
}

impl ClassifierData {
    pub fn to_class_states(&self) -> anyhow::Result<Vec<ClassState>> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, class)| {
                class.to_class_state().with_context(|| {
                    format!("Invalid class #{i} of classifier {:?}", self.name)
                })
            })
            .collect()
    }
}

impl ClassData {
    pub fn to_class_state(&self) -> anyhow::Result<ClassState> {
        let training = rows_to_matrix(&self.training).context("Invalid training rows")?;
        let check = self
            .check
            .as_deref()
            .map(rows_to_matrix)
            .transpose()
            .context("Invalid check rows")?;
        Ok(ClassState::new(
            self.name.clone(),
            self.id,
            training,
            check,
        )?)
    }
}

/// Stacks equally long rows into a matrix.
pub fn rows_to_matrix(rows: &[Vec<f64>]) -> anyhow::Result<DMatrix<f64>> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        anyhow::bail!("row {i} has {} values, expected {width}", row.len());
    }
    Ok(DMatrix::from_fn(rows.len(), width, |r, c| rows[r][c]))
}
