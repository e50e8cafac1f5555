//! Configuration management for the risk classification service

use crate::error::{Error, Result};
use crate::models::adapter::DEFAULT_MAX_LENGTH;
use crate::types::label::RiskLabel;
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// One base model declaration. The order of declarations in the config
/// file is the canonical model order for the whole process.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    /// Registry name, unique within the config
    pub name: String,
    /// Model directory, relative to `models_dir`
    pub path: String,
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing per-model subdirectories and the optional
    /// `meta_model.onnx`
    pub models_dir: String,
    /// Base models to load, in canonical order
    pub entries: Vec<ModelSpec>,
    /// Token budget per input; longer inputs are truncated silently
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Number of threads for ONNX inference per session (default: 1)
    #[serde(default = "default_ort_threads")]
    pub ort_threads: usize,
    /// Number of base models the stacking combiner was fitted on
    #[serde(default = "default_combiner_models")]
    pub combiner_models: usize,
}

fn default_max_length() -> usize {
    DEFAULT_MAX_LENGTH
}

fn default_ort_threads() -> usize {
    1
}

fn default_combiner_models() -> usize {
    3
}

/// Ensemble presentation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnsembleConfig {
    /// Per-label confidence thresholds. Presentation only: a prediction
    /// below its label's threshold is flagged low-confidence, never
    /// relabeled.
    #[serde(default = "default_confidence_thresholds")]
    pub confidence_thresholds: HashMap<RiskLabel, f32>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            confidence_thresholds: default_confidence_thresholds(),
        }
    }
}

fn default_confidence_thresholds() -> HashMap<RiskLabel, f32> {
    let mut thresholds = HashMap::new();
    thresholds.insert(RiskLabel::NoRisk, 0.85);
    thresholds.insert(RiskLabel::Low, 0.70);
    thresholds.insert(RiskLabel::Moderate, 0.65);
    thresholds.insert(RiskLabel::High, 0.75);
    thresholds
}

/// Audit log configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// JSON-lines file the analysis records are appended to
    #[serde(default = "default_audit_path")]
    pub log_path: String,
    /// Source tag written into every record
    #[serde(default = "default_audit_source")]
    pub source: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            log_path: default_audit_path(),
            source: default_audit_source(),
        }
    }
}

fn default_audit_enabled() -> bool {
    true
}

fn default_audit_path() -> String {
    "logs/analysis_log.jsonl".to_string()
}

fn default_audit_source() -> String {
    "http_api".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| Error::config(format!("failed to build configuration: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("failed to deserialize configuration: {e}")))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let entries = vec![
            ModelSpec {
                name: "xlnet".to_string(),
                path: "xlnet".to_string(),
            },
            ModelSpec {
                name: "distilbert".to_string(),
                path: "distill".to_string(),
            },
            ModelSpec {
                name: "mental-roberta".to_string(),
                path: "aimh".to_string(),
            },
        ];

        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                entries,
                max_length: default_max_length(),
                ort_threads: 1,
                combiner_models: 3,
            },
            ensemble: EnsembleConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.models.entries.len(), 3);
        assert_eq!(config.models.entries[0].name, "xlnet");
        assert_eq!(config.models.max_length, 128);
        assert_eq!(config.models.combiner_models, 3);
        assert!(config.audit.enabled);
    }

    #[test]
    fn test_default_confidence_thresholds() {
        let thresholds = default_confidence_thresholds();
        assert_eq!(thresholds.get(&RiskLabel::NoRisk), Some(&0.85));
        assert_eq!(thresholds.get(&RiskLabel::Moderate), Some(&0.65));
    }
}
