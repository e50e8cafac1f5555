//! Mental Health Risk Classification Ensemble
//!
//! Classifies free-text input into one of four risk tiers by combining
//! the predictions of several independently trained text classifiers.
//! Partial model failure is tolerated per call; only total failure is an
//! error.

pub mod audit;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod server;
pub mod text;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use models::registry::ModelRegistry;
pub use models::service::PredictionService;
pub use types::{Prediction, RiskLabel};
