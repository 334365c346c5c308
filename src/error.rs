// src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeightingError {
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unweightable cell: zero denominator at row '{row}', column '{col}'")]
    UnweightableCell { row: String, col: String },

    #[error(
        "raking did not converge after {iterations} iterations \
         (max row discrepancy {row_discrepancy}, max column discrepancy {col_discrepancy})"
    )]
    DidNotConverge {
        iterations: usize,
        row_discrepancy: f64,
        col_discrepancy: f64,
    },

    #[error("calibration system is singular and cannot be solved")]
    SingularSystem,

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, WeightingError>;
