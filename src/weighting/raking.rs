// src/weighting/raking.rs

use ndarray::Axis;

use crate::error::{Result, WeightingError};
use crate::table::Table;

use super::reweighter::{report_stage_quality, Reweighter, ReweighterInputs};

/// Options for the iterative proportional fitting loop.
#[derive(Debug, Clone, Copy)]
pub struct RakeConfig {
    /// Maximum number of row/column sweeps before reporting
    /// non-convergence.
    pub max_iter: usize,
    /// Row and column sums are rounded to this many decimal places and
    /// compared exactly against the rounded targets to decide
    /// convergence.
    pub round_digits: i32,
}

impl Default for RakeConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            round_digits: 2,
        }
    }
}

/// Rake `current` toward `target`'s margins and return the per-cell
/// weight table `raked / current`.
///
/// The tables must share row and column labels. The loop alternates a
/// row step (scale each row to the target row sum) and a column step
/// (scale each column to the target column sum) until both sets of
/// sums, rounded to `config.round_digits` places, equal the rounded
/// targets.
///
/// # Errors
/// * `DidNotConverge` - the margins are unreachable (a zero margin in
///   `current` where `target` requires mass) or `max_iter` sweeps pass
///   without the convergence test holding. Carries the last-observed
///   maximum row and column discrepancies.
/// * `UnweightableCell` - `current` has a zero cell, so the weight for
///   that cell is undefined.
pub fn rake(current: &Table, target: &Table, config: &RakeConfig) -> Result<Table> {
    current.align_with(target, current.col_labels())?;
    // Margin arithmetic below is positional, so the target's columns
    // must be put into the current table's order first.
    let target = target.select(current.col_labels())?;

    let expected_row = target.row_sums();
    let expected_col = target.col_sums();
    let total = expected_row.sum();

    let current_total = current.total();
    if current_total == 0.0 {
        return Err(WeightingError::InvalidInput(
            "cannot rake a table whose counts sum to zero".to_string(),
        ));
    }

    // Scale once so grand totals match before iterating.
    let mut raked = current.values() * (total / current_total);

    for iteration in 0..config.max_iter {
        // Row step.
        let row_sums = raked.sum_axis(Axis(1));
        for i in 0..raked.nrows() {
            if row_sums[i] == 0.0 {
                if expected_row[i] > 0.0 {
                    return Err(WeightingError::DidNotConverge {
                        iterations: iteration,
                        row_discrepancy: expected_row[i],
                        col_discrepancy: max_abs_diff(&raked.sum_axis(Axis(0)), &expected_col),
                    });
                }
                continue;
            }
            let factor = expected_row[i] / row_sums[i];
            raked.row_mut(i).mapv_inplace(|x| x * factor);
        }

        // Column step.
        let col_sums = raked.sum_axis(Axis(0));
        for j in 0..raked.ncols() {
            if col_sums[j] == 0.0 {
                if expected_col[j] > 0.0 {
                    return Err(WeightingError::DidNotConverge {
                        iterations: iteration,
                        row_discrepancy: max_abs_diff(&raked.sum_axis(Axis(1)), &expected_row),
                        col_discrepancy: expected_col[j],
                    });
                }
                continue;
            }
            let factor = expected_col[j] / col_sums[j];
            raked.column_mut(j).mapv_inplace(|x| x * factor);
        }

        // Convergence test: rounded row and column sums must equal the
        // rounded targets exactly.
        let row_sums = raked.sum_axis(Axis(1));
        let col_sums = raked.sum_axis(Axis(0));
        let rows_match = row_sums
            .iter()
            .zip(expected_row.iter())
            .all(|(&a, &b)| round_to(a, config.round_digits) == round_to(b, config.round_digits));
        let cols_match = col_sums
            .iter()
            .zip(expected_col.iter())
            .all(|(&a, &b)| round_to(a, config.round_digits) == round_to(b, config.round_digits));

        if rows_match && cols_match {
            tracing::debug!(iterations = iteration + 1, "raking converged");
            return current.like(raked).ratio(current);
        }
    }

    Err(WeightingError::DidNotConverge {
        iterations: config.max_iter,
        row_discrepancy: max_abs_diff(&raked.sum_axis(Axis(1)), &expected_row),
        col_discrepancy: max_abs_diff(&raked.sum_axis(Axis(0)), &expected_col),
    })
}

fn round_to(x: f64, digits: i32) -> f64 {
    let p = 10f64.powi(digits);
    (x * p).round() / p
}

fn max_abs_diff(a: &ndarray::Array1<f64>, b: &ndarray::Array1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0, f64::max)
}

/// Raking: iterative proportional fitting against the crosstab's and
/// then the population's margins; the combined weight is the product of
/// the two stage weight tables.
pub struct RakeReweighter {
    inputs: ReweighterInputs,
    config: RakeConfig,
}

impl RakeReweighter {
    pub fn new(
        crosstab: &Table,
        sample: &Table,
        population: &Table,
        cols: &[String],
    ) -> Result<Self> {
        Self::with_config(crosstab, sample, population, cols, RakeConfig::default())
    }

    pub fn with_config(
        crosstab: &Table,
        sample: &Table,
        population: &Table,
        cols: &[String],
        config: RakeConfig,
    ) -> Result<Self> {
        Ok(Self {
            inputs: ReweighterInputs::new(crosstab, sample, population, cols)?,
            config,
        })
    }
}

impl Reweighter for RakeReweighter {
    fn reweight(&self, return_weights: bool) -> Result<Table> {
        let crosstab = self.inputs.crosstab()?;
        let sample = self.inputs.sample()?;
        let population = self.inputs.population()?;

        // Rake the crosstab toward the sample's margins, then the
        // sample toward the population's margins.
        let ct_v_sample = rake(&crosstab, &sample, &self.config)?;
        report_stage_quality("crosstab vs. sample", &ct_v_sample);

        let sample_v_pop = rake(&sample, &population, &self.config)?;
        report_stage_quality("sample vs. population", &sample_v_pop);

        let weights = ct_v_sample.product(&sample_v_pop)?;

        if return_weights {
            Ok(weights)
        } else {
            self.inputs.apply_weights(&weights)
        }
    }
}
