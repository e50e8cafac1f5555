//! HTTP serving layer
//!
//! Thin boundary over the prediction service: cleans and validates the
//! incoming text, runs the ensemble on a blocking thread, audits the
//! result, and maps the error taxonomy onto HTTP status codes.

use crate::audit::{AnalysisLogger, AnalysisRecord};
use crate::error::Error;
use crate::metrics::ServiceMetrics;
use crate::models::service::PredictionService;
use crate::text::{self, TextCleaner};
use crate::types::label::RiskLabel;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub cleaner: Arc<TextCleaner>,
    pub metrics: Arc<ServiceMetrics>,
    pub audit: Option<Arc<AnalysisLogger>>,
    /// Per-label presentation thresholds; never change the predicted label.
    pub confidence_thresholds: Arc<HashMap<RiskLabel, f32>>,
    pub audit_source: String,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub label: RiskLabel,
    pub confidence: f32,
    pub low_confidence: bool,
}

/// Build the Axum application. CORS is open because the chat front end is
/// served from a different origin.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "models": state.service.registry().model_names(),
        "combiner": state.service.registry().has_combiner(),
    }))
}

async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> axum::response::Response {
    let start = Instant::now();

    let cleaned = state.cleaner.clean_for_analysis(&req.text);
    if let Err(e) = text::validate_input(&cleaned) {
        return error_response(StatusCode::BAD_REQUEST, &e.to_string());
    }

    let service = state.service.clone();
    let input = cleaned.clone();
    let result = match tokio::task::spawn_blocking(move || service.predict(&input)).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "prediction task failed to complete");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };

    match result {
        Ok(prediction) => {
            let threshold = state
                .confidence_thresholds
                .get(&prediction.label)
                .copied()
                .unwrap_or(0.0);
            let low_confidence = prediction.confidence < threshold;

            state
                .metrics
                .record_analysis(start.elapsed(), prediction.label, low_confidence);
            if let Some(audit) = &state.audit {
                audit.log(&AnalysisRecord::new(
                    cleaned,
                    &prediction,
                    state.audit_source.clone(),
                ));
            }

            Json(PredictResponse {
                label: prediction.label,
                confidence: prediction.confidence,
                low_confidence,
            })
            .into_response()
        }
        Err(e @ Error::AllModelsFailed) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
        Err(e @ Error::InvalidInput(_)) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e) => {
            error!(error = %e, "prediction failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Run the server until the process is stopped.
pub async fn run(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_app(state);

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
