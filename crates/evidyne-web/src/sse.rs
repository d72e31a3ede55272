//! Server-Sent Events stream for workflow progress.
//!
//! Every engine event is forwarded as one JSON-encoded SSE message.
//! Subscribers that fall behind the broadcast buffer lose the lagged
//! events and resume with the next live one; the UI re-reads
//! `/api/workflow` to resynchronize.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use evidyne_workflow::WorkflowEvent;
use futures_core::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::state::SharedState;

fn encode(event: &WorkflowEvent) -> Option<Event> {
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().data(data))
}

/// GET /api/events — one JSON workflow event per SSE message.
pub async fn sse_handler(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("sse subscriber connected");
    let events = BroadcastStream::new(state.subscribe())
        .filter_map(|received| received.ok().as_ref().and_then(encode).map(Ok));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
