//! Per-model inference adapter
//!
//! Runs one base model over a batch of cleaned input strings and applies
//! the numeric-safety contract: a model whose output contains any NaN, or
//! that fails in any other way, is reported unusable for the call instead
//! of aborting the whole prediction.

use crate::models::ensemble::{argmax, Combiner};
use crate::models::registry::ModelEntry;
use crate::types::label::NUM_LABELS;
use crate::types::prediction::ProbabilityVector;
use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use std::sync::RwLock;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

/// Default cap on tokenized input length. Inputs past this are truncated
/// silently; length validation happens at the text-cleaning layer.
pub const DEFAULT_MAX_LENGTH: usize = 128;

/// Inference seam for one base model.
pub trait BaseModel: Send + Sync {
    /// Probability distributions over the shared label space, one per
    /// input, in input order.
    fn predict_probs(&self, texts: &[String]) -> Result<Vec<ProbabilityVector>>;
}

/// Outcome of running one model over a batch.
pub enum ModelOutcome {
    Usable(Vec<ProbabilityVector>),
    Unusable,
}

/// Run one registry entry over a batch of inputs.
///
/// NaN anywhere in the output disqualifies the model for this call rather
/// than being clamped or repaired; a corrupted confidence must never reach
/// the aggregation engine.
pub fn run_model(entry: &ModelEntry, texts: &[String]) -> ModelOutcome {
    match entry.model.predict_probs(texts) {
        Ok(batch) => {
            if batch.len() != texts.len() {
                warn!(
                    model = %entry.name,
                    expected = texts.len(),
                    got = batch.len(),
                    "model returned wrong batch length, skipping for this call"
                );
                return ModelOutcome::Unusable;
            }
            if batch.iter().flatten().any(|p| p.is_nan()) {
                warn!(
                    model = %entry.name,
                    "model output contained NaN probabilities, skipping for this call"
                );
                return ModelOutcome::Unusable;
            }
            ModelOutcome::Usable(batch)
        }
        Err(e) => {
            warn!(
                model = %entry.name,
                error = %e,
                "model inference failed, skipping for this call"
            );
            ModelOutcome::Unusable
        }
    }
}

/// Input and output tensor names probed from an ONNX session at load time.
#[derive(Debug, Clone)]
pub struct ModelIoNames {
    pub input_ids: String,
    pub attention_mask: String,
    pub logits: String,
}

/// Transformer sequence classifier backed by an ONNX Runtime session.
///
/// The session is behind a lock because `ort` requires exclusive access to
/// run; nothing else is mutated after construction.
pub struct OnnxModel {
    session: RwLock<Session>,
    tokenizer: Tokenizer,
    io: ModelIoNames,
    max_length: usize,
}

impl OnnxModel {
    pub fn new(session: Session, tokenizer: Tokenizer, io: ModelIoNames, max_length: usize) -> Self {
        Self {
            session: RwLock::new(session),
            tokenizer,
            io,
            max_length,
        }
    }

    fn predict_one(&self, text: &str) -> Result<ProbabilityVector> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let mut mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        // Silent, deterministic truncation to the configured token budget.
        ids.truncate(self.max_length);
        mask.truncate(self.max_length);

        if ids.is_empty() {
            anyhow::bail!("tokenizer produced no tokens");
        }

        let shape = vec![1_i64, ids.len() as i64];
        let ids_tensor = Tensor::from_array((shape.clone(), ids))
            .context("failed to create input_ids tensor")?;
        let mask_tensor = Tensor::from_array((shape, mask))
            .context("failed to create attention_mask tensor")?;

        let mut session = self
            .session
            .write()
            .map_err(|e| anyhow::anyhow!("lock error: {}", e))?;
        let outputs = session.run(ort::inputs![
            &self.io.input_ids => ids_tensor,
            &self.io.attention_mask => mask_tensor
        ])?;

        let logits = extract_label_scores(&outputs, &self.io.logits)?;
        Ok(softmax(&logits))
    }
}

impl BaseModel for OnnxModel {
    fn predict_probs(&self, texts: &[String]) -> Result<Vec<ProbabilityVector>> {
        let mut batch = Vec::with_capacity(texts.len());
        for text in texts {
            batch.push(self.predict_one(text)?);
        }
        Ok(batch)
    }
}

/// Stacking combiner backed by an ONNX export of the fitted meta-model.
/// The export must emit class probabilities as a plain float tensor
/// (sklearn converters: ZipMap disabled).
pub struct OnnxCombiner {
    session: RwLock<Session>,
    input_name: String,
    output_name: String,
    trained_models: usize,
}

impl OnnxCombiner {
    pub fn new(
        session: Session,
        input_name: String,
        output_name: String,
        trained_models: usize,
    ) -> Self {
        Self {
            session: RwLock::new(session),
            input_name,
            output_name,
            trained_models,
        }
    }
}

impl Combiner for OnnxCombiner {
    fn trained_models(&self) -> usize {
        self.trained_models
    }

    fn combine(&self, features: &[f32]) -> Result<(usize, f32)> {
        let shape = vec![1_i64, features.len() as i64];
        let tensor = Tensor::from_array((shape, features.to_vec()))
            .context("failed to create combiner feature tensor")?;

        let mut session = self
            .session
            .write()
            .map_err(|e| anyhow::anyhow!("lock error: {}", e))?;
        let outputs = session.run(ort::inputs![&self.input_name => tensor])?;

        let probs = extract_label_scores(&outputs, &self.output_name)?;
        debug!(probs = ?probs, "combiner class probabilities");
        Ok(argmax(&probs))
    }
}

/// Pull a `[1, NUM_LABELS]` (or `[NUM_LABELS]`) float tensor out of the
/// session outputs, by name first and by scanning as a fallback.
fn extract_label_scores(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
) -> Result<[f32; NUM_LABELS]> {
    if let Some(output) = outputs.get(output_name) {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return scores_from_tensor(&shape, data);
        }
    }

    // Fallback: first float output that is not the integer label column.
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return scores_from_tensor(&shape, data);
        }
    }

    anyhow::bail!("no float tensor output named {output_name:?} in model outputs")
}

fn scores_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> Result<[f32; NUM_LABELS]> {
    let dims: Vec<i64> = shape.iter().copied().collect();
    let class_count = dims.last().copied().unwrap_or(0) as usize;
    if class_count != NUM_LABELS || data.len() < NUM_LABELS {
        anyhow::bail!(
            "expected {NUM_LABELS} classes in model output, got shape {:?}",
            dims
        );
    }

    let mut scores = [0.0f32; NUM_LABELS];
    scores.copy_from_slice(&data[..NUM_LABELS]);
    Ok(scores)
}

/// Numerically stable softmax. NaN logits propagate into the result, where
/// the adapter's usability check catches them.
fn softmax(logits: &[f32; NUM_LABELS]) -> ProbabilityVector {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut probs = [0.0f32; NUM_LABELS];
    let mut sum = 0.0f32;
    for (slot, &logit) in probs.iter_mut().zip(logits.iter()) {
        *slot = (logit - max).exp();
        sum += *slot;
    }
    for slot in &mut probs {
        *slot /= sum;
    }
    probs
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel {
        probs: ProbabilityVector,
    }

    impl BaseModel for FixedModel {
        fn predict_probs(&self, texts: &[String]) -> Result<Vec<ProbabilityVector>> {
            Ok(texts.iter().map(|_| self.probs).collect())
        }
    }

    struct FailingModel;

    impl BaseModel for FailingModel {
        fn predict_probs(&self, _texts: &[String]) -> Result<Vec<ProbabilityVector>> {
            anyhow::bail!("resource exhausted")
        }
    }

    struct ShortBatchModel;

    impl BaseModel for ShortBatchModel {
        fn predict_probs(&self, _texts: &[String]) -> Result<Vec<ProbabilityVector>> {
            Ok(vec![[0.25, 0.25, 0.25, 0.25]])
        }
    }

    fn entry(model: impl BaseModel + 'static) -> ModelEntry {
        ModelEntry {
            name: "test-model".to_string(),
            model: Box::new(model),
        }
    }

    fn batch(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_usable_output_passes_through() {
        let entry = entry(FixedModel {
            probs: [0.1, 0.2, 0.3, 0.4],
        });

        match run_model(&entry, &batch(&["a", "b"])) {
            ModelOutcome::Usable(probs) => {
                assert_eq!(probs.len(), 2);
                assert_eq!(probs[0], [0.1, 0.2, 0.3, 0.4]);
            }
            ModelOutcome::Unusable => panic!("expected usable output"),
        }
    }

    #[test]
    fn test_nan_output_is_unusable() {
        let entry = entry(FixedModel {
            probs: [0.1, f32::NAN, 0.3, 0.4],
        });

        assert!(matches!(
            run_model(&entry, &batch(&["a"])),
            ModelOutcome::Unusable
        ));
    }

    #[test]
    fn test_inference_error_is_unusable() {
        let entry = entry(FailingModel);

        assert!(matches!(
            run_model(&entry, &batch(&["a"])),
            ModelOutcome::Unusable
        ));
    }

    #[test]
    fn test_wrong_batch_length_is_unusable() {
        let entry = entry(ShortBatchModel);

        assert!(matches!(
            run_model(&entry, &batch(&["a", "b"])),
            ModelOutcome::Unusable
        ));
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0, 4.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[3] > probs[2] && probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_propagates_nan() {
        let probs = softmax(&[1.0, f32::NAN, 3.0, 4.0]);
        assert!(probs.iter().any(|p| p.is_nan()));
    }
}
