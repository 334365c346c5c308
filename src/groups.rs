// src/groups.rs

use ndarray::Array1;

use crate::error::{Result, WeightingError};
use crate::table::Table;

/// Grouping of column names into mutually exclusive category sets
/// (e.g. `{CD1, CD2, CD3, CD4}` or `{EDU_NO_COLL, EDU_COLL}`).
///
/// Used in table preparation only: validating that the categories a
/// reweighting will use are present and consistent with a row total,
/// and deriving an "unknown" residual column where a group does not
/// account for the full total. The reweighting math itself never looks
/// at groups.
#[derive(Debug, Clone)]
pub struct ColumnGroups {
    groups: Vec<Vec<String>>,
}

impl ColumnGroups {
    /// Build a group spec. Groups must be non-empty and a column may
    /// belong to at most one group.
    pub fn new<S: Into<String>>(groups: Vec<Vec<S>>) -> Result<Self> {
        let groups: Vec<Vec<String>> = groups
            .into_iter()
            .map(|g| g.into_iter().map(Into::into).collect())
            .collect();

        let mut seen: Vec<&String> = Vec::new();
        for group in &groups {
            if group.is_empty() {
                return Err(WeightingError::InvalidInput(
                    "empty column group".to_string(),
                ));
            }
            for col in group {
                if seen.contains(&col) {
                    return Err(WeightingError::InvalidInput(format!(
                        "column '{}' appears in more than one group",
                        col
                    )));
                }
                seen.push(col);
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Check that every grouped column is present in the table.
    pub fn validate(&self, table: &Table) -> Result<()> {
        for group in &self.groups {
            for col in group {
                if table.col_index(col).is_none() {
                    return Err(WeightingError::SchemaMismatch(format!(
                        "grouped column '{}' not present in table",
                        col
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check that each group is exhaustive within tolerance: per row, a
    /// group's sum must not exceed the `total_col` value by more than `tol`.
    pub fn check_exhaustive(&self, table: &Table, total_col: &str, tol: f64) -> Result<()> {
        self.validate(table)?;

        for (group_index, _) in self.groups.iter().enumerate() {
            let residual = self.residual(table, group_index, total_col)?;
            for (i, &r) in residual.iter().enumerate() {
                if r < -tol {
                    return Err(WeightingError::InvalidInput(format!(
                        "group {} exceeds total '{}' by {} in row '{}'",
                        group_index,
                        total_col,
                        -r,
                        table.row_labels()[i]
                    )));
                }
            }
        }

        Ok(())
    }

    /// Derive the residual ("unknown") column for a group and append it
    /// to the table: `total - sum(group columns)` per row. The new column
    /// is named `<PREFIX>_UNK`, with the prefix taken from the group's
    /// first column name.
    pub fn with_residual(&self, table: &Table, group_index: usize, total_col: &str) -> Result<Table> {
        let group = self.groups.get(group_index).ok_or_else(|| {
            WeightingError::InvalidInput(format!("no column group at index {}", group_index))
        })?;

        let residual = self.residual(table, group_index, total_col)?;
        for (i, &r) in residual.iter().enumerate() {
            if r < 0.0 {
                return Err(WeightingError::InvalidInput(format!(
                    "negative residual {} for row '{}'; group sum exceeds '{}'",
                    r,
                    table.row_labels()[i],
                    total_col
                )));
            }
        }

        let prefix = group[0].split('_').next().unwrap_or(&group[0]);
        table.with_column(&format!("{}_UNK", prefix), residual)
    }

    fn residual(&self, table: &Table, group_index: usize, total_col: &str) -> Result<Array1<f64>> {
        let group = self.groups.get(group_index).ok_or_else(|| {
            WeightingError::InvalidInput(format!("no column group at index {}", group_index))
        })?;

        let total_idx = table.col_index(total_col).ok_or_else(|| {
            WeightingError::SchemaMismatch(format!(
                "total column '{}' not present in table",
                total_col
            ))
        })?;

        let sub = table.select(group)?;
        let group_sums = sub.row_sums();
        let totals = table.values().column(total_idx);

        Ok(&totals - &group_sums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn prep_table() -> Table {
        // LV is the row total; EDU columns under-count it.
        Table::new(
            vec!["HARRIS", "TRUMP"],
            vec!["LV", "EDU_NO_COLL", "EDU_COLL"],
            array![[100.0, 40.0, 50.0], [80.0, 45.0, 30.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_construction_preserves_groups() {
        let groups =
            ColumnGroups::new(vec![vec!["CD1", "CD2"], vec!["EDU_NO_COLL", "EDU_COLL"]]).unwrap();

        assert_eq!(groups.groups().len(), 2);
        assert_eq!(
            groups.groups()[1],
            vec!["EDU_NO_COLL".to_string(), "EDU_COLL".to_string()]
        );
    }

    #[test]
    fn test_duplicate_column_across_groups() {
        let result = ColumnGroups::new(vec![vec!["CD1", "CD2"], vec!["CD2", "CD3"]]);
        assert!(matches!(result, Err(WeightingError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_missing_column() {
        let groups = ColumnGroups::new(vec![vec!["EDU_NO_COLL", "EDU_MISSING"]]).unwrap();
        let result = groups.validate(&prep_table());
        assert!(matches!(result, Err(WeightingError::SchemaMismatch(_))));
    }

    #[test]
    fn test_residual_column() {
        let groups = ColumnGroups::new(vec![vec!["EDU_NO_COLL", "EDU_COLL"]]).unwrap();
        let extended = groups.with_residual(&prep_table(), 0, "LV").unwrap();

        assert_relative_eq!(extended.get("HARRIS", "EDU_UNK").unwrap(), 10.0);
        assert_relative_eq!(extended.get("TRUMP", "EDU_UNK").unwrap(), 5.0);
    }

    #[test]
    fn test_negative_residual_rejected() {
        let table = Table::new(
            vec!["HARRIS"],
            vec!["LV", "EDU_NO_COLL", "EDU_COLL"],
            array![[80.0, 45.0, 50.0]],
        )
        .unwrap();

        let groups = ColumnGroups::new(vec![vec!["EDU_NO_COLL", "EDU_COLL"]]).unwrap();
        let result = groups.with_residual(&table, 0, "LV");
        assert!(matches!(result, Err(WeightingError::InvalidInput(_))));

        let check = groups.check_exhaustive(&table, "LV", 1.0);
        assert!(check.is_err());
    }

    #[test]
    fn test_exhaustive_within_tolerance() {
        let groups = ColumnGroups::new(vec![vec!["EDU_NO_COLL", "EDU_COLL"]]).unwrap();
        assert!(groups.check_exhaustive(&prep_table(), "LV", 0.5).is_ok());
    }
}
