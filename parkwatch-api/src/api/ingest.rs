//! Manual ingestion trigger endpoints
//!
//! Run one pipeline to completion and return the per-target outcomes.
//! Overlapping triggers are not serialized; at most one trigger in flight
//! per process is assumed.

use crate::models::TargetOutcome;
use crate::services::IngestOrchestrator;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;

/// Summary of one triggered ingestion run
#[derive(Debug, Serialize)]
pub struct IngestRunResponse {
    pub pipeline: String,
    pub outcomes: Vec<TargetOutcome>,
}

/// POST /api/ingest/counter
pub async fn run_counter(State(state): State<AppState>) -> Json<IngestRunResponse> {
    let orchestrator = IngestOrchestrator::new(state.db.clone(), state.config.clone());
    let outcomes = orchestrator.run_counter().await;

    Json(IngestRunResponse {
        pipeline: "counter".to_string(),
        outcomes,
    })
}

/// POST /api/ingest/vision
pub async fn run_vision(State(state): State<AppState>) -> Json<IngestRunResponse> {
    let orchestrator = IngestOrchestrator::new(state.db.clone(), state.config.clone());
    let outcome = orchestrator.run_vision().await;

    Json(IngestRunResponse {
        pipeline: "vision".to_string(),
        outcomes: vec![outcome],
    })
}

/// Build ingestion trigger routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/api/ingest/counter", post(run_counter))
        .route("/api/ingest/vision", post(run_vision))
}
