// src/weighting/calibration.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::error::{Result, WeightingError};
use crate::table::Table;

use super::reweighter::{report_stage_quality, Reweighter, ReweighterInputs};

/// Linear (GREG) calibration of base weights to auxiliary totals.
///
/// Solves for Lagrange multipliers λ in `(X' diag(d) X) λ = t - X'd`,
/// computes g-factors `g = 1 + Xλ` and returns the calibrated weights
/// `d * g`. The calibrated weights reproduce the auxiliary totals
/// exactly: `Σ w_i x_i = t`.
///
/// # Arguments
/// * `base` - Base weights `d` (n_obs,)
/// * `x_matrix` - Auxiliary variables (n_obs, n_aux)
/// * `totals` - Known totals for the auxiliary variables (n_aux,)
pub fn calibrate(
    base: ArrayView1<f64>,
    x_matrix: ArrayView2<f64>,
    totals: ArrayView1<f64>,
) -> Result<Array1<f64>> {
    let n_obs = base.len();
    let (n_obs_x, n_aux) = x_matrix.dim();

    if n_obs_x != n_obs {
        return Err(WeightingError::SchemaMismatch(format!(
            "auxiliary matrix has {} rows but {} base weights were given",
            n_obs_x, n_obs
        )));
    }
    if totals.len() != n_aux {
        return Err(WeightingError::SchemaMismatch(format!(
            "{} auxiliary totals for {} auxiliary variables",
            totals.len(),
            n_aux
        )));
    }

    // Current weighted totals: X'd
    let mut x_w: Array1<f64> = Array1::zeros(n_aux);
    for j in 0..n_aux {
        for i in 0..n_obs {
            x_w[j] += x_matrix[[i, j]] * base[i];
        }
    }

    // System matrix: A = X' diag(d) X
    let mut a_matrix = Array2::zeros((n_aux, n_aux));
    for j1 in 0..n_aux {
        for j2 in 0..n_aux {
            let mut sum = 0.0;
            for i in 0..n_obs {
                sum += x_matrix[[i, j1]] * base[i] * x_matrix[[i, j2]];
            }
            a_matrix[[j1, j2]] = sum;
        }
    }

    let b = &totals - &x_w;
    let lambda = solve_linear_system(&a_matrix, &b)?;

    // g-factors and calibrated weights
    let mut calibrated = Array1::zeros(n_obs);
    for i in 0..n_obs {
        let mut x_lambda = 0.0;
        for j in 0..n_aux {
            x_lambda += x_matrix[[i, j]] * lambda[j];
        }
        calibrated[i] = base[i] * (1.0 + x_lambda);
    }

    Ok(calibrated)
}

/// Solve `Ax = b` by Gaussian elimination with partial pivoting.
fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();

    // Augmented matrix [A|b]
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for k in 0..n {
        // Partial pivot
        let mut max_val = aug[[k, k]].abs();
        let mut max_row = k;
        for i in (k + 1)..n {
            if aug[[i, k]].abs() > max_val {
                max_val = aug[[i, k]].abs();
                max_row = i;
            }
        }

        if max_val < 1e-10 {
            return Err(WeightingError::SingularSystem);
        }

        if max_row != k {
            for j in 0..=n {
                let tmp = aug[[k, j]];
                aug[[k, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }

        for i in (k + 1)..n {
            let factor = aug[[i, k]] / aug[[k, k]];
            for j in k..=n {
                aug[[i, j]] -= factor * aug[[k, j]];
            }
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[[i, n]];
        for j in (i + 1)..n {
            sum -= aug[[i, j]] * x[j];
        }
        x[i] = sum / aug[[i, i]];
    }

    Ok(x)
}

/// GREG calibration as a reweighting strategy.
///
/// Each stage treats the current table's cells as units with the cell
/// counts as base weights, the row and column memberships as auxiliary
/// indicators, and the target table's margins as the totals (the last
/// column constraint is redundant given the row constraints and is
/// dropped). The stage weight for a cell is its g-factor. Unlike
/// raking this is a one-shot linear solve, not a fixed-point iteration,
/// so the calibrated margins match to floating point rather than to a
/// rounding tolerance.
pub struct GregCalibrator {
    inputs: ReweighterInputs,
}

impl GregCalibrator {
    pub fn new(
        crosstab: &Table,
        sample: &Table,
        population: &Table,
        cols: &[String],
    ) -> Result<Self> {
        Ok(Self {
            inputs: ReweighterInputs::new(crosstab, sample, population, cols)?,
        })
    }

    fn stage(current: &Table, target: &Table) -> Result<Table> {
        current.align_with(target, current.col_labels())?;
        // The margin totals are read positionally, so the target's
        // columns must be put into the current table's order first.
        let target = target.select(current.col_labels())?;

        let nr = current.nrows();
        let nc = current.ncols();

        for i in 0..nr {
            for j in 0..nc {
                if current.values()[[i, j]] == 0.0 {
                    return Err(WeightingError::UnweightableCell {
                        row: current.row_labels()[i].clone(),
                        col: current.col_labels()[j].clone(),
                    });
                }
            }
        }

        // One auxiliary indicator per row and per column but the last.
        let n = nr * nc;
        let n_aux = nr + nc - 1;
        let mut x_matrix = Array2::zeros((n, n_aux));
        let mut base = Array1::zeros(n);

        for i in 0..nr {
            for j in 0..nc {
                let u = i * nc + j;
                base[u] = current.values()[[i, j]];
                x_matrix[[u, i]] = 1.0;
                if j < nc - 1 {
                    x_matrix[[u, nr + j]] = 1.0;
                }
            }
        }

        let row_totals = target.row_sums();
        let col_totals = target.col_sums();
        let mut totals = Array1::zeros(n_aux);
        for i in 0..nr {
            totals[i] = row_totals[i];
        }
        for j in 0..(nc - 1) {
            totals[nr + j] = col_totals[j];
        }

        let calibrated = calibrate(base.view(), x_matrix.view(), totals.view())?;

        let mut multipliers = Array2::zeros((nr, nc));
        for i in 0..nr {
            for j in 0..nc {
                let u = i * nc + j;
                multipliers[[i, j]] = calibrated[u] / base[u];
            }
        }

        Ok(current.like(multipliers))
    }
}

impl Reweighter for GregCalibrator {
    fn reweight(&self, return_weights: bool) -> Result<Table> {
        let crosstab = self.inputs.crosstab()?;
        let sample = self.inputs.sample()?;
        let population = self.inputs.population()?;

        let ct_v_sample = Self::stage(&crosstab, &sample)?;
        report_stage_quality("crosstab vs. sample", &ct_v_sample);

        let sample_v_pop = Self::stage(&sample, &population)?;
        report_stage_quality("sample vs. population", &sample_v_pop);

        let weights = ct_v_sample.product(&sample_v_pop)?;

        if return_weights {
            Ok(weights)
        } else {
            self.inputs.apply_weights(&weights)
        }
    }
}
