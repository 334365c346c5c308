// src/weighting/reweighter.rs

use crate::error::{Result, WeightingError};
use crate::table::Table;

/// A reweighting strategy.
///
/// Implementations hold a target crosstab, a drawn sample, and a
/// population table plus the list of columns to reweight, and produce a
/// per-cell weight table (or the sample with weights applied).
pub trait Reweighter {
    /// Compute adjustment weights.
    ///
    /// # Arguments
    /// * `return_weights` - If true, return the weight table itself;
    ///   otherwise return the sample with weights applied elementwise
    ///   (`sample_cell * weight_cell`).
    fn reweight(&self, return_weights: bool) -> Result<Table>;
}

/// The three input tables and reweighted columns shared by every
/// strategy. Construction takes defensive copies and validates the
/// schemas up front: every requested column must exist in all three
/// tables, and row labels must align.
#[derive(Debug, Clone)]
pub struct ReweighterInputs {
    crosstab: Table,
    sample: Table,
    population: Table,
    cols: Vec<String>,
}

impl ReweighterInputs {
    pub fn new(
        crosstab: &Table,
        sample: &Table,
        population: &Table,
        cols: &[String],
    ) -> Result<Self> {
        if cols.is_empty() {
            return Err(WeightingError::InvalidInput(
                "no columns to reweight".to_string(),
            ));
        }

        sample.align_with(crosstab, cols)?;
        sample.align_with(population, cols)?;

        Ok(Self {
            crosstab: crosstab.clone(),
            sample: sample.clone(),
            population: population.clone(),
            cols: cols.to_vec(),
        })
    }

    pub fn cols(&self) -> &[String] {
        &self.cols
    }

    /// The crosstab restricted to the reweighted columns.
    pub fn crosstab(&self) -> Result<Table> {
        self.crosstab.select(&self.cols)
    }

    /// The sample restricted to the reweighted columns.
    pub fn sample(&self) -> Result<Table> {
        self.sample.select(&self.cols)
    }

    /// The population restricted to the reweighted columns.
    pub fn population(&self) -> Result<Table> {
        self.population.select(&self.cols)
    }

    /// Apply a weight table to the sample: `sample_cell * weight_cell`
    /// over the reweighted columns.
    pub fn apply_weights(&self, weights: &Table) -> Result<Table> {
        self.sample()?.product(weights)
    }
}

/// Quality of a weight set: `1 + (std / mean)^2` over the flattened
/// weight cells (population standard deviation). Equals 1 when every
/// weight is identical and grows with weight dispersion, approximating
/// the variance inflation from unequal weighting.
///
/// TODO: this is the original's formula kept for behavioral parity; it
/// differs from the Kish design effect `n * sum(w^2) / sum(w)^2` and is
/// a candidate for review.
pub fn quality(weights: &Table) -> f64 {
    let values = weights.values();
    let n = values.len();
    if n == 0 {
        return 1.0;
    }

    let mean = values.sum() / n as f64;
    let var = values.iter().map(|&w| (w - mean) * (w - mean)).sum::<f64>() / n as f64;
    let std = var.sqrt();

    1.0 + (std / mean) * (std / mean)
}

/// Report a stage's quality value on the diagnostics channel. The
/// metric is a diagnostic only and is never part of the returned table.
pub(crate) fn report_stage_quality(stage: &str, weights: &Table) {
    tracing::info!(stage, quality = quality(weights), "stage weight quality");
}
