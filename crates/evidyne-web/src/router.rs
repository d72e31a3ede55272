//! HTTP route table.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::export::export_report;
use crate::handlers::workflow::{
    back_to_input, restart_workflow, run_report, run_search, submit_topic, toggle_all_documents,
    toggle_document, toggle_keyword, workflow_snapshot,
};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Assembles the API router with CORS, compression and request tracing.
pub fn build_router(state: AppState) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        // Session state and transitions
        .route("/api/workflow", get(workflow_snapshot))
        .route("/api/workflow/topic", post(submit_topic))
        .route("/api/workflow/search", post(run_search))
        .route("/api/workflow/report", post(run_report))
        .route("/api/workflow/restart", post(restart_workflow))
        .route("/api/workflow/back", post(back_to_input))

        // Selection toggles
        .route("/api/workflow/keywords/{id}/toggle", post(toggle_keyword))
        .route("/api/workflow/documents/{id}/toggle", post(toggle_document))
        .route("/api/workflow/documents/toggle-all", post(toggle_all_documents))

        // Report download
        .route("/api/report/export", get(export_report))

        // Event stream
        .route("/api/events", get(sse_handler))

        // Shared middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
