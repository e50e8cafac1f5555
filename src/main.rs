//! Risk Classification Service - Main Entry Point
//!
//! Loads the model registry, then serves ensemble risk predictions over
//! HTTP. A registry with zero usable models aborts startup; the process
//! never enters serving state without at least one model.

use anyhow::Result;
use risk_ensemble::{
    audit::AnalysisLogger,
    config::AppConfig,
    metrics::{MetricsReporter, ServiceMetrics},
    models::registry::ModelRegistry,
    models::service::PredictionService,
    server::{self, AppState},
    text::TextCleaner,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("risk_ensemble={}", config.logging.level).parse()?);
    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting mental health risk classification service");

    // Build the model registry; this is the single fatal load condition
    let registry = match ModelRegistry::load(&config.models) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "no usable models, refusing to start");
            return Err(e.into());
        }
    };
    info!(
        models = ?registry.model_names(),
        combiner = registry.has_combiner(),
        "inference ready"
    );

    let service = Arc::new(PredictionService::new(Arc::new(registry)));
    let cleaner = Arc::new(TextCleaner::new()?);
    let metrics = Arc::new(ServiceMetrics::new());

    // Audit log is best-effort: a broken sink disables auditing, never serving
    let audit = if config.audit.enabled {
        match AnalysisLogger::open(&config.audit.log_path) {
            Ok(logger) => {
                info!(path = %config.audit.log_path, "audit logging enabled");
                Some(Arc::new(logger))
            }
            Err(e) => {
                warn!(error = %e, "audit logging disabled");
                None
            }
        }
    } else {
        None
    };

    // Start metrics reporter (prints summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        service,
        cleaner,
        metrics,
        audit,
        confidence_thresholds: Arc::new(config.ensemble.confidence_thresholds.clone()),
        audit_source: config.audit.source.clone(),
    };

    server::run(state, addr).await
}
