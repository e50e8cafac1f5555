//! Prediction output types.

use crate::types::label::{RiskLabel, NUM_LABELS};
use serde::{Deserialize, Serialize};

/// Softmax output of one base model for one input, indices aligned to the
/// shared label-id space. Values are not re-validated here; degenerate
/// vectors are filtered out by the inference adapter before aggregation.
pub type ProbabilityVector = [f32; NUM_LABELS];

/// Final ensemble output for one input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted risk tier.
    pub label: RiskLabel,
    /// Probability the ensemble assigns to that tier, in [0, 1]. Reported
    /// as produced; no smoothing or thresholding is applied.
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_serialization() {
        let prediction = Prediction {
            label: RiskLabel::High,
            confidence: 0.82,
        };

        let json = serde_json::to_string(&prediction).unwrap();
        let deserialized: Prediction = serde_json::from_str(&json).unwrap();

        assert_eq!(prediction.label, deserialized.label);
        assert_eq!(prediction.confidence, deserialized.confidence);
    }
}
