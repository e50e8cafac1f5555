//! ONNX model and tokenizer loading

use crate::models::adapter::{ModelIoNames, OnnxCombiner, OnnxModel};
use crate::models::ensemble::Combiner;
use crate::models::registry::ModelEntry;
use crate::types::label::RiskLabel;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Loader for ONNX classifier models and their tokenizers.
pub struct ModelLoader {
    /// Number of threads for ONNX inference per session
    ort_threads: usize,
    /// Token budget applied to every input
    max_length: usize,
}

impl ModelLoader {
    /// Create a new model loader, initializing ONNX Runtime.
    pub fn new(ort_threads: usize, max_length: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(ort_threads = ort_threads, "ONNX Runtime initialized");
        Ok(Self {
            ort_threads,
            max_length,
        })
    }

    /// Load one base model from its directory, which must contain
    /// `model.onnx` and `tokenizer.json` and may carry a `labels.json`
    /// declaring the label order the model was trained against.
    pub fn load_model(&self, dir: &Path, name: &str) -> Result<ModelEntry> {
        info!(model = %name, path = %dir.display(), "loading model");

        self.validate_label_mapping(dir, name)?;

        let model_path = dir.join("model.onnx");
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.ort_threads)?
            .commit_from_file(&model_path)
            .context(format!("failed to load model from {:?}", model_path))?;

        let tokenizer_path = dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer from {tokenizer_path:?}: {e}"))?;

        let io = probe_io_names(&session);
        info!(
            model = %name,
            input = %io.input_ids,
            output = %io.logits,
            "model loaded successfully"
        );

        Ok(ModelEntry {
            name: name.to_string(),
            model: Box::new(OnnxModel::new(session, tokenizer, io, self.max_length)),
        })
    }

    /// Load the optional stacking combiner from `<models_dir>/meta_model.onnx`.
    /// Absence is a capability flag, not an error.
    pub fn load_combiner(
        &self,
        models_dir: &Path,
        trained_models: usize,
    ) -> Option<Box<dyn Combiner>> {
        let path = models_dir.join("meta_model.onnx");
        if !path.exists() {
            info!("no combiner found, predictions will use averaged probabilities");
            return None;
        }

        match self.load_combiner_session(&path, trained_models) {
            Ok(combiner) => {
                info!(trained_models = trained_models, "stacking combiner loaded");
                Some(Box::new(combiner))
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to load combiner, predictions will use averaged probabilities"
                );
                None
            }
        }
    }

    fn load_combiner_session(&self, path: &Path, trained_models: usize) -> Result<OnnxCombiner> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.ort_threads)?
            .commit_from_file(path)
            .context(format!("failed to load combiner from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        Ok(OnnxCombiner::new(
            session,
            input_name,
            output_name,
            trained_models,
        ))
    }

    /// Check the model's declared label order against the shared label
    /// space. A mismatch is a configuration error that fails this model's
    /// load; it is never deferred to predict time.
    fn validate_label_mapping(&self, dir: &Path, name: &str) -> Result<()> {
        let path = dir.join("labels.json");
        if !path.exists() {
            debug!(model = %name, "no labels.json, assuming canonical label order");
            return Ok(());
        }

        let raw = std::fs::read_to_string(&path)
            .context(format!("failed to read label mapping from {:?}", path))?;
        let declared: Vec<String> =
            serde_json::from_str(&raw).context("label mapping is not a JSON string array")?;

        // Legacy training metadata spells no_risk with a space.
        let declared: Vec<String> = declared
            .iter()
            .map(|l| l.trim().to_lowercase().replace(' ', "_"))
            .collect();
        let expected: Vec<String> = RiskLabel::ALL.iter().map(|l| l.as_str().to_string()).collect();

        if declared != expected {
            anyhow::bail!(
                "model {name} declares label order {declared:?}, expected {expected:?}"
            );
        }
        Ok(())
    }
}

/// Probe input/output tensor names from session metadata, falling back to
/// the conventional transformer export names.
fn probe_io_names(session: &Session) -> ModelIoNames {
    let input_ids = session
        .inputs
        .iter()
        .find(|i| i.name.contains("input_ids"))
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "input_ids".to_string());

    let attention_mask = session
        .inputs
        .iter()
        .find(|i| i.name.contains("mask"))
        .map(|i| i.name.clone())
        .unwrap_or_else(|| "attention_mask".to_string());

    let logits = session
        .outputs
        .iter()
        .find(|o| o.name.contains("logits") || o.name.contains("output"))
        .map(|o| o.name.clone())
        .unwrap_or_else(|| {
            session
                .outputs
                .last()
                .map(|o| o.name.clone())
                .unwrap_or_else(|| "logits".to_string())
        });

    ModelIoNames {
        input_ids,
        attention_mask,
        logits,
    }
}
