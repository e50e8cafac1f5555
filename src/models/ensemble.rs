//! Ensemble aggregation for multi-model risk classification
//!
//! Merges the probability vectors collected from the surviving base models
//! into a single label + confidence, either through the stacking combiner
//! or through an unweighted element-wise average.

use crate::error::{Error, Result};
use crate::types::label::{RiskLabel, NUM_LABELS};
use crate::types::prediction::{Prediction, ProbabilityVector};
use tracing::{debug, warn};

/// Second-stage stacking classifier fitted on concatenated base-model
/// outputs.
pub trait Combiner: Send + Sync {
    /// Number of base models the combiner was fitted on. Its feature vector
    /// width is this count times [`NUM_LABELS`].
    fn trained_models(&self) -> usize;

    /// Predicted label id and the combiner's own confidence (its maximum
    /// class probability) for one concatenated feature vector.
    fn combine(&self, features: &[f32]) -> anyhow::Result<(usize, f32)>;
}

/// Probability vectors collected for one prediction call: one batch per
/// surviving model, in registry load order. Lifetime is a single call.
#[derive(Default)]
pub struct EnsembleSnapshot {
    batches: Vec<Vec<ProbabilityVector>>,
}

impl EnsembleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one surviving model's output. Models must be pushed in
    /// registry order; that order fixes the combiner feature layout.
    pub fn push(&mut self, batch: Vec<ProbabilityVector>) {
        self.batches.push(batch);
    }

    /// Number of models that produced a usable result.
    pub fn model_count(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    fn batch_len(&self) -> usize {
        self.batches.first().map_or(0, Vec::len)
    }
}

/// Aggregate a snapshot into one prediction per input.
///
/// The combiner path is taken only when a combiner is present and the
/// surviving model count equals the count it was trained on; otherwise the
/// call falls back to averaging. Missing models are never zero-filled.
pub fn aggregate(
    snapshot: &EnsembleSnapshot,
    combiner: Option<&dyn Combiner>,
) -> Result<Vec<Prediction>> {
    if snapshot.is_empty() {
        return Err(Error::AllModelsFailed);
    }

    if let Some(combiner) = combiner {
        if snapshot.model_count() == combiner.trained_models() {
            match combine_all(snapshot, combiner) {
                Ok(predictions) => return Ok(predictions),
                Err(e) => {
                    warn!(error = %e, "combiner failed, falling back to averaged probabilities");
                }
            }
        } else {
            debug!(
                surviving = snapshot.model_count(),
                trained = combiner.trained_models(),
                "surviving models do not match combiner width, using averaged probabilities"
            );
        }
    }

    Ok(average_all(snapshot))
}

/// Stacking path: feed each input's concatenated vectors to the combiner.
fn combine_all(
    snapshot: &EnsembleSnapshot,
    combiner: &dyn Combiner,
) -> anyhow::Result<Vec<Prediction>> {
    let mut predictions = Vec::with_capacity(snapshot.batch_len());

    for idx in 0..snapshot.batch_len() {
        let features: Vec<f32> = snapshot
            .batches
            .iter()
            .flat_map(|batch| batch[idx])
            .collect();

        let (label_id, confidence) = combiner.combine(&features)?;
        let label = RiskLabel::from_id(label_id)
            .ok_or_else(|| anyhow::anyhow!("combiner returned unknown label id {label_id}"))?;
        if !confidence.is_finite() {
            anyhow::bail!("combiner returned non-finite confidence {confidence}");
        }

        predictions.push(Prediction { label, confidence });
    }

    Ok(predictions)
}

/// Averaging path: unweighted element-wise mean of the surviving vectors.
/// Equal weighting is a design choice; any future per-model weighting must
/// come from explicit configuration.
fn average_all(snapshot: &EnsembleSnapshot) -> Vec<Prediction> {
    let model_count = snapshot.model_count() as f32;
    let mut predictions = Vec::with_capacity(snapshot.batch_len());

    for idx in 0..snapshot.batch_len() {
        let mut mean = [0.0f32; NUM_LABELS];
        for batch in &snapshot.batches {
            for (slot, value) in mean.iter_mut().zip(batch[idx].iter()) {
                *slot += value;
            }
        }
        for slot in &mut mean {
            *slot /= model_count;
        }

        let (label_id, confidence) = argmax(&mean);
        predictions.push(Prediction {
            label: RiskLabel::ALL[label_id],
            confidence,
        });
    }

    predictions
}

/// Index and value of the maximum entry; exact ties keep the lowest index
/// so repeated calls with identical input stay deterministic.
pub(crate) fn argmax(values: &[f32; NUM_LABELS]) -> (usize, f32) {
    let mut best = 0;
    for (idx, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = idx;
        }
    }
    (best, values[best])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCombiner {
        trained: usize,
        output: anyhow::Result<(usize, f32)>,
    }

    impl Combiner for FixedCombiner {
        fn trained_models(&self) -> usize {
            self.trained
        }

        fn combine(&self, _features: &[f32]) -> anyhow::Result<(usize, f32)> {
            match &self.output {
                Ok(pair) => Ok(*pair),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn snapshot_of(batches: Vec<Vec<ProbabilityVector>>) -> EnsembleSnapshot {
        let mut snapshot = EnsembleSnapshot::new();
        for batch in batches {
            snapshot.push(batch);
        }
        snapshot
    }

    #[test]
    fn test_average_matches_argmax_of_mean() {
        let snapshot = snapshot_of(vec![
            vec![[0.1, 0.1, 0.1, 0.7]],
            vec![[0.2, 0.3, 0.4, 0.1]],
        ]);

        let predictions = aggregate(&snapshot, None).unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, RiskLabel::NoRisk);
        assert!((predictions[0].confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_tie_resolves_to_lowest_id() {
        let snapshot = snapshot_of(vec![vec![[0.4, 0.4, 0.1, 0.1]]]);

        let predictions = aggregate(&snapshot, None).unwrap();

        assert_eq!(predictions[0].label, RiskLabel::Low);
        assert!((predictions[0].confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_empty_snapshot_is_total_failure() {
        let snapshot = EnsembleSnapshot::new();
        assert!(matches!(
            aggregate(&snapshot, None),
            Err(Error::AllModelsFailed)
        ));
    }

    #[test]
    fn test_combiner_used_when_width_matches() {
        let snapshot = snapshot_of(vec![
            vec![[0.1, 0.1, 0.1, 0.7]],
            vec![[0.2, 0.3, 0.4, 0.1]],
        ]);
        let combiner = FixedCombiner {
            trained: 2,
            output: Ok((2, 0.9)),
        };

        let predictions = aggregate(&snapshot, Some(&combiner)).unwrap();

        assert_eq!(predictions[0].label, RiskLabel::High);
        assert!((predictions[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_combiner_skipped_on_width_mismatch() {
        // Combiner trained on 3 models, only 2 survived this call.
        let snapshot = snapshot_of(vec![
            vec![[0.1, 0.1, 0.1, 0.7]],
            vec![[0.2, 0.3, 0.4, 0.1]],
        ]);
        let combiner = FixedCombiner {
            trained: 3,
            output: Ok((0, 1.0)),
        };

        let predictions = aggregate(&snapshot, Some(&combiner)).unwrap();

        assert_eq!(predictions[0].label, RiskLabel::NoRisk);
        assert!((predictions[0].confidence - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_combiner_error_falls_back_to_average() {
        let snapshot = snapshot_of(vec![vec![[0.2, 0.3, 0.4, 0.1]]]);
        let combiner = FixedCombiner {
            trained: 1,
            output: Err(anyhow::anyhow!("inference failed")),
        };

        let predictions = aggregate(&snapshot, Some(&combiner)).unwrap();

        assert_eq!(predictions[0].label, RiskLabel::High);
    }

    #[test]
    fn test_combiner_bad_label_id_falls_back() {
        let snapshot = snapshot_of(vec![vec![[0.2, 0.3, 0.4, 0.1]]]);
        let combiner = FixedCombiner {
            trained: 1,
            output: Ok((7, 0.9)),
        };

        let predictions = aggregate(&snapshot, Some(&combiner)).unwrap();

        assert_eq!(predictions[0].label, RiskLabel::High);
    }

    #[test]
    fn test_argmax_ties() {
        assert_eq!(argmax(&[0.25, 0.25, 0.25, 0.25]), (0, 0.25));
        assert_eq!(argmax(&[0.1, 0.5, 0.5, 0.2]), (1, 0.5));
        assert_eq!(argmax(&[0.0, 0.0, 0.0, 1.0]), (3, 1.0));
    }
}
