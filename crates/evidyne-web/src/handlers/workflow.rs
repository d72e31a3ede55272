//! Session endpoints: snapshot, transitions, and selection toggles.
//!
//! One transition at a time: handlers take the session mutex with
//! `try_lock`, so a running transition answers 409 instead of queueing.
//! The long transitions (topic, search, report) validate their guards
//! synchronously, then move the held guard into a background task and
//! answer 202; completion is observable on the SSE stream and in the
//! state snapshot. Toggles apply inline and return the updated state.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tokio::sync::OwnedMutexGuard;
use tracing::warn;
use uuid::Uuid;

use evidyne_common::ApiError;
use evidyne_workflow::{CountTicket, Stage, Workflow, WorkflowError, WorkflowState};

use crate::state::SharedState;

// ── Shared plumbing ───────────────────────────────────────────────────────────

pub(crate) fn lock_session(state: &SharedState) -> Result<OwnedMutexGuard<Workflow>, ApiError> {
    state
        .workflow
        .clone()
        .try_lock_owned()
        .map_err(|_| ApiError::Conflict("a transition is already running".to_string()))
}

pub(crate) fn reject(err: WorkflowError) -> ApiError {
    match err {
        WorkflowError::Busy | WorkflowError::WrongStage(_) => ApiError::Conflict(err.to_string()),
        WorkflowError::EmptyTopic | WorkflowError::NoHits | WorkflowError::NoDocumentsSelected => {
            ApiError::BadRequest(err.to_string())
        }
        WorkflowError::UnknownId(_) => ApiError::NotFound(err.to_string()),
        other => ApiError::Internal(other.to_string()),
    }
}

fn require_stage(session: &Workflow, expected: Stage) -> Result<(), ApiError> {
    let stage = session.state().stage;
    if stage != expected {
        return Err(reject(WorkflowError::WrongStage(stage)));
    }
    Ok(())
}

/// Runs the count search off-lock, then briefly takes the lock to apply.
/// Stale tickets lose to whatever bumped the epoch in the meantime.
async fn run_recount(state: SharedState, ticket: CountTicket) {
    let count = match state
        .literature
        .search(&ticket.query, state.max_results)
        .await
    {
        Ok(hits) => hits.count,
        Err(err) => {
            warn!(error = %err, "hit-count search failed, reporting zero");
            0
        }
    };
    let mut session = state.workflow.lock().await;
    session.apply_hit_count(&ticket, count);
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// GET /api/workflow — current state, served without touching the lock.
pub async fn workflow_snapshot(State(state): State<SharedState>) -> Json<WorkflowState> {
    Json(state.snapshot())
}

// ── Transitions ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TopicRequest {
    pub topic: String,
}

/// POST /api/workflow/topic — start keyword extraction.
pub async fn submit_topic(
    State(state): State<SharedState>,
    Json(req): Json<TopicRequest>,
) -> Result<StatusCode, ApiError> {
    let mut session = lock_session(&state)?;
    require_stage(&session, Stage::Input)?;
    if req.topic.trim().is_empty() {
        return Err(reject(WorkflowError::EmptyTopic));
    }

    tokio::spawn(async move {
        if session.submit_topic(&req.topic).await.is_ok() {
            // count the fresh strategy right away
            let ticket = session.count_ticket();
            drop(session);
            if let Some(ticket) = ticket {
                run_recount(state, ticket).await;
            }
        }
    });
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/workflow/search — start retrieval and per-document analysis.
pub async fn run_search(State(state): State<SharedState>) -> Result<StatusCode, ApiError> {
    let mut session = lock_session(&state)?;
    require_stage(&session, Stage::KeywordSelection)?;
    if session.state().hit_count == 0 {
        return Err(reject(WorkflowError::NoHits));
    }

    tokio::spawn(async move {
        let _ = session.proceed_to_review().await;
    });
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/workflow/report — start report synthesis.
pub async fn run_report(State(state): State<SharedState>) -> Result<StatusCode, ApiError> {
    let mut session = lock_session(&state)?;
    require_stage(&session, Stage::DocumentReview)?;
    if session.state().selected_documents().is_empty() {
        return Err(reject(WorkflowError::NoDocumentsSelected));
    }

    tokio::spawn(async move {
        let _ = session.synthesize().await;
    });
    Ok(StatusCode::ACCEPTED)
}

// ── Selection toggles ─────────────────────────────────────────────────────────

/// POST /api/workflow/keywords/{id}/toggle — flip one keyword and spawn
/// the epoch-tagged recount.
pub async fn toggle_keyword(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowState>, ApiError> {
    let mut session = lock_session(&state)?;
    let ticket = session.toggle_keyword(&id).map_err(reject)?;
    let snapshot = session.snapshot();
    drop(session);

    if let Some(ticket) = ticket {
        tokio::spawn(run_recount(state, ticket));
    }
    Ok(Json(snapshot))
}

/// POST /api/workflow/documents/{id}/toggle
pub async fn toggle_document(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowState>, ApiError> {
    let mut session = lock_session(&state)?;
    session.toggle_document(&id).map_err(reject)?;
    Ok(Json(session.snapshot()))
}

/// POST /api/workflow/documents/toggle-all
pub async fn toggle_all_documents(
    State(state): State<SharedState>,
) -> Result<Json<WorkflowState>, ApiError> {
    let mut session = lock_session(&state)?;
    session.toggle_all_documents().map_err(reject)?;
    Ok(Json(session.snapshot()))
}

// ── Returning to Input ────────────────────────────────────────────────────────

/// POST /api/workflow/restart — from Report, discard the session.
pub async fn restart_workflow(
    State(state): State<SharedState>,
) -> Result<Json<WorkflowState>, ApiError> {
    let mut session = lock_session(&state)?;
    session.restart().map_err(reject)?;
    Ok(Json(session.snapshot()))
}

/// POST /api/workflow/back — from KeywordSelection, keep everything and
/// return to the topic form.
pub async fn back_to_input(
    State(state): State<SharedState>,
) -> Result<Json<WorkflowState>, ApiError> {
    let mut session = lock_session(&state)?;
    session.back_to_input().map_err(reject)?;
    Ok(Json(session.snapshot()))
}
