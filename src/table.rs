// src/table.rs

use ndarray::{Array1, Array2, Axis};

use crate::error::{Result, WeightingError};

/// A table of non-negative counts with labeled rows and columns.
///
/// Rows are keyed by an identifier (e.g. a candidate or a demographic
/// stratum), columns by category names (e.g. congressional district or
/// education level). This is the shared representation for the three
/// tables participating in a reweighting: crosstab, sample, population.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    values: Array2<f64>,
}

impl Table {
    /// Build a table from row labels, column labels and a value matrix.
    ///
    /// Fails on a shape mismatch, duplicate labels, or any cell that is
    /// negative or non-finite.
    pub fn new<R, C>(rows: Vec<R>, cols: Vec<C>, values: Array2<f64>) -> Result<Self>
    where
        R: Into<String>,
        C: Into<String>,
    {
        let row_labels: Vec<String> = rows.into_iter().map(Into::into).collect();
        let col_labels: Vec<String> = cols.into_iter().map(Into::into).collect();

        if values.nrows() != row_labels.len() || values.ncols() != col_labels.len() {
            return Err(WeightingError::SchemaMismatch(format!(
                "value matrix is {}x{} but {} row labels and {} column labels were given",
                values.nrows(),
                values.ncols(),
                row_labels.len(),
                col_labels.len()
            )));
        }

        check_unique(&row_labels, "row")?;
        check_unique(&col_labels, "column")?;

        for (i, row_label) in row_labels.iter().enumerate() {
            for (j, col_label) in col_labels.iter().enumerate() {
                let v = values[[i, j]];
                if !v.is_finite() || v < 0.0 {
                    return Err(WeightingError::InvalidInput(format!(
                        "cell ('{}', '{}') is {}; counts must be finite and non-negative",
                        row_label, col_label, v
                    )));
                }
            }
        }

        Ok(Self {
            row_labels,
            col_labels,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.col_labels.iter().position(|c| c == name)
    }

    pub fn row_index(&self, name: &str) -> Option<usize> {
        self.row_labels.iter().position(|r| r == name)
    }

    /// Look up a cell by labels.
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let i = self.row_index(row)?;
        let j = self.col_index(col)?;
        Some(self.values[[i, j]])
    }

    /// Sub-table holding the named columns, in the given order.
    pub fn select(&self, cols: &[String]) -> Result<Table> {
        let mut indices = Vec::with_capacity(cols.len());
        for col in cols {
            let idx = self.col_index(col).ok_or_else(|| {
                WeightingError::SchemaMismatch(format!("column '{}' not present in table", col))
            })?;
            indices.push(idx);
        }

        let mut values = Array2::zeros((self.nrows(), cols.len()));
        for (new_j, &old_j) in indices.iter().enumerate() {
            values.column_mut(new_j).assign(&self.values.column(old_j));
        }

        Ok(Table {
            row_labels: self.row_labels.clone(),
            col_labels: cols.to_vec(),
            values,
        })
    }

    /// Sum of each row across the table's columns.
    pub fn row_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(1))
    }

    /// Sum of each column across the table's rows.
    pub fn col_sums(&self) -> Array1<f64> {
        self.values.sum_axis(Axis(0))
    }

    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Validate that `other` shares this table's row labels (same order)
    /// and carries every requested column. Reweighting across mismatched
    /// schemas is not defined, so this fails rather than coercing.
    pub fn align_with(&self, other: &Table, cols: &[String]) -> Result<()> {
        if self.row_labels != other.row_labels {
            return Err(WeightingError::SchemaMismatch(format!(
                "row labels do not align: {:?} vs {:?}",
                self.row_labels, other.row_labels
            )));
        }

        for col in cols {
            if self.col_index(col).is_none() || other.col_index(col).is_none() {
                return Err(WeightingError::SchemaMismatch(format!(
                    "column '{}' not present in both tables",
                    col
                )));
            }
        }

        Ok(())
    }

    /// Elementwise ratio `self / denom` over identically shaped tables.
    ///
    /// A zero denominator cell is reported as an unweightable cell,
    /// identified by its row and column labels, instead of silently
    /// producing NaN or infinity.
    pub fn ratio(&self, denom: &Table) -> Result<Table> {
        self.check_same_shape(denom)?;

        let mut values = Array2::zeros(self.values.raw_dim());
        for i in 0..self.nrows() {
            for j in 0..self.ncols() {
                let d = denom.values[[i, j]];
                if d == 0.0 {
                    return Err(WeightingError::UnweightableCell {
                        row: self.row_labels[i].clone(),
                        col: self.col_labels[j].clone(),
                    });
                }
                values[[i, j]] = self.values[[i, j]] / d;
            }
        }

        Ok(Table {
            row_labels: self.row_labels.clone(),
            col_labels: self.col_labels.clone(),
            values,
        })
    }

    /// Elementwise product over identically shaped tables.
    pub fn product(&self, other: &Table) -> Result<Table> {
        self.check_same_shape(other)?;
        Ok(Table {
            row_labels: self.row_labels.clone(),
            col_labels: self.col_labels.clone(),
            values: &self.values * &other.values,
        })
    }

    /// Append a column to the table.
    pub fn with_column(&self, name: &str, values: Array1<f64>) -> Result<Table> {
        if values.len() != self.nrows() {
            return Err(WeightingError::SchemaMismatch(format!(
                "new column '{}' has {} values but table has {} rows",
                name,
                values.len(),
                self.nrows()
            )));
        }
        if self.col_index(name).is_some() {
            return Err(WeightingError::InvalidInput(format!(
                "column '{}' already present",
                name
            )));
        }

        let mut new_values = Array2::zeros((self.nrows(), self.ncols() + 1));
        new_values
            .slice_mut(ndarray::s![.., ..self.ncols()])
            .assign(&self.values);
        new_values.column_mut(self.ncols()).assign(&values);

        let mut col_labels = self.col_labels.clone();
        col_labels.push(name.to_string());

        Ok(Table {
            row_labels: self.row_labels.clone(),
            col_labels,
            values: new_values,
        })
    }

    /// Construct a table of the same shape and labels from raw values.
    /// Used by the weighting algorithms for intermediate results, which
    /// may legitimately hold non-count values (e.g. weight multipliers).
    pub(crate) fn like(&self, values: Array2<f64>) -> Table {
        debug_assert_eq!(values.dim(), self.values.dim());
        Table {
            row_labels: self.row_labels.clone(),
            col_labels: self.col_labels.clone(),
            values,
        }
    }

    fn check_same_shape(&self, other: &Table) -> Result<()> {
        if self.row_labels != other.row_labels || self.col_labels != other.col_labels {
            return Err(WeightingError::SchemaMismatch(
                "tables do not share row and column labels".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_unique(labels: &[String], kind: &str) -> Result<()> {
    for (i, label) in labels.iter().enumerate() {
        if labels[..i].contains(label) {
            return Err(WeightingError::InvalidInput(format!(
                "duplicate {} label '{}'",
                kind, label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn small_table() -> Table {
        Table::new(
            vec!["A1", "A2"],
            vec!["B1", "B2", "B3"],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_sums() {
        let t = small_table();
        let rows = t.row_sums();
        let cols = t.col_sums();

        assert_relative_eq!(rows[0], 6.0);
        assert_relative_eq!(rows[1], 15.0);
        assert_relative_eq!(cols[2], 9.0);
        assert_relative_eq!(t.total(), 21.0);
    }

    #[test]
    fn test_select_preserves_order() {
        let t = small_table();
        let sub = t.select(&["B3".to_string(), "B1".to_string()]).unwrap();

        assert_eq!(sub.col_labels(), &["B3".to_string(), "B1".to_string()]);
        assert_relative_eq!(sub.values()[[0, 0]], 3.0);
        assert_relative_eq!(sub.values()[[0, 1]], 1.0);
    }

    #[test]
    fn test_select_missing_column() {
        let t = small_table();
        let result = t.select(&["B9".to_string()]);
        assert!(matches!(result, Err(WeightingError::SchemaMismatch(_))));
    }

    #[test]
    fn test_negative_count_rejected() {
        let result = Table::new(vec!["A1"], vec!["B1"], array![[-1.0]]);
        assert!(matches!(result, Err(WeightingError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let result = Table::new(vec!["A1", "A1"], vec!["B1"], array![[1.0], [2.0]]);
        assert!(matches!(result, Err(WeightingError::InvalidInput(_))));
    }

    #[test]
    fn test_ratio_zero_denominator() {
        let num = small_table();
        let denom = Table::new(
            vec!["A1", "A2"],
            vec!["B1", "B2", "B3"],
            array![[1.0, 0.0, 1.0], [1.0, 1.0, 1.0]],
        )
        .unwrap();

        match num.ratio(&denom) {
            Err(WeightingError::UnweightableCell { row, col }) => {
                assert_eq!(row, "A1");
                assert_eq!(col, "B2");
            }
            other => panic!("expected UnweightableCell, got {:?}", other),
        }
    }

    #[test]
    fn test_align_with_mismatched_rows() {
        let a = small_table();
        let b = Table::new(
            vec!["A1", "A3"],
            vec!["B1", "B2", "B3"],
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        )
        .unwrap();

        let result = a.align_with(&b, &["B1".to_string()]);
        assert!(matches!(result, Err(WeightingError::SchemaMismatch(_))));
    }

    #[test]
    fn test_with_column() {
        let t = small_table();
        let extended = t.with_column("B4", array![7.0, 8.0]).unwrap();

        assert_eq!(extended.ncols(), 4);
        assert_relative_eq!(extended.get("A2", "B4").unwrap(), 8.0);
    }
}
