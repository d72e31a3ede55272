//! Plain-text report export.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use evidyne_common::ApiError;

use crate::handlers::workflow::{lock_session, reject};
use crate::state::SharedState;

/// GET /api/report/export — the finished report as a text attachment.
pub async fn export_report(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let session = lock_session(&state)?;
    let export = session.export_report().map_err(reject)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export.filename),
            ),
        ],
        export.content,
    ))
}
