// src/weighting/cell.rs

use crate::error::Result;
use crate::table::Table;

use super::reweighter::{report_stage_quality, Reweighter, ReweighterInputs};

/// Cell weighting: two sequential elementwise ratio adjustments.
///
/// Stage one compares the drawn sample to the survey crosstab
/// (`sample / crosstab`), stage two the population to the drawn sample
/// (`population / sample`); the combined weight is their product.
/// Closed form and cheap, but enforces no marginal constraint and blows
/// up when a denominator cell is near zero; raking is the safer choice
/// for sparse tables.
pub struct CellReweighter {
    inputs: ReweighterInputs,
}

impl CellReweighter {
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
}

impl Reweighter for CellReweighter {
    fn reweight(&self, return_weights: bool) -> Result<Table> {
        let crosstab = self.inputs.crosstab()?;
        let sample = self.inputs.sample()?;
        let population = self.inputs.population()?;

        // sample relative to the survey crosstab
        let ct_v_sample = sample.ratio(&crosstab)?;
        report_stage_quality("crosstab vs. sample", &ct_v_sample);

        // population relative to the drawn sample
        let sample_v_pop = population.ratio(&sample)?;
        report_stage_quality("sample vs. population", &sample_v_pop);

        let weights = ct_v_sample.product(&sample_v_pop)?;

        if return_weights {
            Ok(weights)
        } else {
            self.inputs.apply_weights(&weights)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WeightingError;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn cols() -> Vec<String> {
        vec!["B1".to_string(), "B2".to_string(), "B3".to_string()]
    }

    fn kalton_crosstab() -> Table {
        Table::new(
            vec!["A1", "A2", "A3", "A4"],
            vec!["B1", "B2", "B3"],
            array![
                [20.0, 40.0, 40.0],
                [50.0, 140.0, 310.0],
                [100.0, 50.0, 50.0],
                [30.0, 100.0, 70.0]
            ],
        )
        .unwrap()
    }

    fn kalton_sample() -> Table {
        Table::new(
            vec!["A1", "A2", "A3", "A4"],
            vec!["B1", "B2", "B3"],
            array![
                [80.0, 40.0, 55.0],
                [60.0, 150.0, 340.0],
                [170.0, 60.0, 200.0],
                [55.0, 165.0, 125.0]
            ],
        )
        .unwrap()
    }

    // Kalton, G., & Flores-Cervantes, I. (2003). Weighting Methods.
    // Journal of Official Statistics, 19(2), 81-97.
    #[test]
    fn test_published_cell_weights() {
        let crosstab = kalton_crosstab();
        let sample = kalton_sample();

        let expected = array![
            [4.0, 1.0, 1.38],
            [1.2, 1.07, 1.1],
            [1.7, 1.2, 4.0],
            [1.83, 1.65, 1.79]
        ];

        let cr = CellReweighter::new(&crosstab, &sample, &sample, &cols()).unwrap();
        let weights = cr.reweight(true).unwrap();

        for i in 0..4 {
            for j in 0..3 {
                assert_relative_eq!(
                    weights.values()[[i, j]],
                    expected[[i, j]],
                    max_relative = 1e-2
                );
            }
        }
    }

    #[test]
    fn test_applied_matches_stage_product() {
        let crosstab = kalton_crosstab();
        let sample = kalton_sample();

        let cr = CellReweighter::new(&crosstab, &sample, &sample, &cols()).unwrap();
        let weights = cr.reweight(true).unwrap();
        let applied = cr.reweight(false).unwrap();

        let expected = sample
            .select(&cols())
            .unwrap()
            .product(&weights)
            .unwrap();

        for i in 0..4 {
            for j in 0..3 {
                assert_relative_eq!(
                    applied.values()[[i, j]],
                    expected.values()[[i, j]],
                    epsilon = 1e-10
                );
            }
        }
    }

    #[test]
    fn test_zero_crosstab_cell_is_unweightable() {
        let mut values = kalton_crosstab().values().clone();
        values[[2, 1]] = 0.0;
        let crosstab = Table::new(
            vec!["A1", "A2", "A3", "A4"],
            vec!["B1", "B2", "B3"],
            values,
        )
        .unwrap();
        let sample = kalton_sample();

        let cr = CellReweighter::new(&crosstab, &sample, &sample, &cols()).unwrap();
        match cr.reweight(true) {
            Err(WeightingError::UnweightableCell { row, col }) => {
                assert_eq!(row, "A3");
                assert_eq!(col, "B2");
            }
            other => panic!("expected UnweightableCell, got {:?}", other),
        }
    }
}
