// src/weighting/mod.rs

pub mod calibration;
pub mod cell;
pub mod raking;
pub mod reweighter;

// Re-export main implementations for easier access
pub use calibration::{calibrate, GregCalibrator};
pub use cell::CellReweighter;
pub use raking::{rake, RakeConfig, RakeReweighter};
pub use reweighter::{quality, Reweighter, ReweighterInputs};
