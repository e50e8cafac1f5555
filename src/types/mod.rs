//! Type definitions for the risk classification service

pub mod label;
pub mod prediction;

pub use label::{RiskLabel, NUM_LABELS};
pub use prediction::{Prediction, ProbabilityVector};
