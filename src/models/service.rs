//! Prediction service facade
//!
//! The single entry point for risk classification. Runs every registered
//! model through the inference adapter, collects the usable outputs into
//! an ensemble snapshot, and hands it to the aggregation engine.

use crate::error::{Error, Result};
use crate::models::adapter::{self, ModelOutcome};
use crate::models::ensemble::{self, EnsembleSnapshot};
use crate::models::registry::ModelRegistry;
use crate::types::prediction::Prediction;
use std::sync::Arc;
use tracing::{debug, warn};

/// Facade over the registry and the aggregation engine. Stateless across
/// calls; the registry is read-only after load, so one instance serves
/// concurrent callers.
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
}

impl PredictionService {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Classify a single input. Equivalent to a one-element batch.
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let batch = [text.to_string()];
        let mut predictions = self.predict_batch(&batch)?;
        // predict_batch returns exactly one prediction per input.
        Ok(predictions.remove(0))
    }

    /// Classify a batch of inputs. The result has the same length and
    /// order as the input; callers depend on that symmetry.
    pub fn predict_batch(&self, texts: &[String]) -> Result<Vec<Prediction>> {
        if texts.is_empty() {
            return Err(Error::invalid_input("empty input batch"));
        }

        let mut snapshot = EnsembleSnapshot::new();
        for entry in self.registry.entries() {
            match adapter::run_model(entry, texts) {
                ModelOutcome::Usable(batch) => snapshot.push(batch),
                // run_model already logged the reason.
                ModelOutcome::Unusable => {}
            }
        }

        if snapshot.is_empty() {
            warn!(
                registered = self.registry.model_count(),
                "every registered model was unusable for this call"
            );
            return Err(Error::AllModelsFailed);
        }

        debug!(
            surviving = snapshot.model_count(),
            registered = self.registry.model_count(),
            inputs = texts.len(),
            "collected ensemble snapshot"
        );

        ensemble::aggregate(&snapshot, self.registry.combiner())
    }
}
