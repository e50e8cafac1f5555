//! Immutable model registry
//!
//! Built once at startup by a single load function and never mutated
//! afterwards, so it is safe to share across concurrent prediction calls.

use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use crate::models::adapter::BaseModel;
use crate::models::ensemble::Combiner;
use crate::models::loader::ModelLoader;
use std::path::Path;
use tracing::{info, warn};

/// One loaded base model. Owned exclusively by the registry.
pub struct ModelEntry {
    pub name: String,
    pub model: Box<dyn BaseModel>,
}

/// The set of loaded base models plus the optional stacking combiner.
///
/// Entry order is the canonical model order: it is the order models were
/// declared in configuration and loaded, and it fixes the combiner's
/// feature layout.
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    combiner: Option<Box<dyn Combiner>>,
}

impl ModelRegistry {
    /// Load every configured model independently. A model that fails to
    /// load is logged and excluded; the only fatal condition is zero models
    /// loading successfully.
    pub fn load(config: &ModelsConfig) -> Result<Self> {
        let loader = ModelLoader::new(config.ort_threads, config.max_length)
            .map_err(|e| Error::config(e.to_string()))?;
        let models_dir = Path::new(&config.models_dir);

        let mut entries = Vec::new();
        for spec in &config.entries {
            let dir = models_dir.join(&spec.path);
            match loader.load_model(&dir, &spec.name) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        model = %spec.name,
                        error = %e,
                        "failed to load model, excluding from registry"
                    );
                }
            }
        }

        let combiner = loader.load_combiner(models_dir, config.combiner_models);

        let registry = Self::from_parts(entries, combiner)?;
        info!(
            count = registry.model_count(),
            models = ?registry.model_names(),
            combiner = registry.has_combiner(),
            "model registry loaded"
        );
        Ok(registry)
    }

    /// Build a registry from already-constructed parts. Same load-time
    /// contract: an empty entry list is the single fatal condition.
    pub fn from_parts(
        entries: Vec<ModelEntry>,
        combiner: Option<Box<dyn Combiner>>,
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::RegistryEmpty);
        }
        Ok(Self { entries, combiner })
    }

    /// Loaded models in canonical order.
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    pub fn model_count(&self) -> usize {
        self.entries.len()
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn has_combiner(&self) -> bool {
        self.combiner.is_some()
    }

    pub fn combiner(&self) -> Option<&dyn Combiner> {
        self.combiner.as_deref()
    }
}
