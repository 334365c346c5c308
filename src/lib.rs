// src/lib.rs

//! Survey sample reweighting.
//!
//! Computes adjustment weights that align a categorical survey sample
//! to known population or crosstab totals, as a step ahead of
//! poststratified modeling. Three strategies share the [`Reweighter`]
//! interface:
//!
//! * [`CellReweighter`] - two sequential elementwise ratio adjustments;
//! * [`RakeReweighter`] - iterative proportional fitting to the target
//!   margins, with a bounded convergence loop;
//! * [`GregCalibrator`] - one-shot linear (GREG) calibration against
//!   the target margins.
//!
//! All three take a survey crosstab, the drawn sample, and the
//! population the sample came from, plus the list of category columns
//! to reweight, and report a design-effect-style quality metric for
//! each adjustment stage on the `tracing` diagnostics channel.
//!
//! Loading and cleaning of raw survey extracts, model fitting, and
//! poststratified prediction are out of scope; the engine consumes
//! prepared [`Table`]s and returns either the weight table or the
//! weighted sample.

pub mod error;
pub mod groups;
pub mod table;
pub mod weighting;

pub use error::{Result, WeightingError};
pub use groups::ColumnGroups;
pub use table::Table;
pub use weighting::{
    calibrate, quality, rake, CellReweighter, GregCalibrator, RakeConfig, RakeReweighter,
    Reweighter, ReweighterInputs,
};
