//! Shared application state for the web server.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use evidyne_workflow::{
    AnalysisService, LiteratureService, Workflow, WorkflowEvent, WorkflowState,
};

/// Shared state injected into every Axum handler.
///
/// The single research session lives behind a `Mutex`; a transition holds
/// the lock for its whole run, so `try_lock` doubles as the busy gate.
/// Reads go through the watch channel the engine publishes into and never
/// touch the lock.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<Mutex<Workflow>>,
    /// Literature handle for off-lock hit-count searches.
    pub literature: Arc<dyn LiteratureService>,
    /// Broadcast channel for SSE push events.
    pub event_tx: broadcast::Sender<WorkflowEvent>,
    pub max_results: usize,
    snapshot_rx: watch::Receiver<WorkflowState>,
}

impl AppState {
    pub fn new(
        literature: Arc<dyn LiteratureService>,
        analyst: Arc<dyn AnalysisService>,
        max_results: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(WorkflowState::new());
        let workflow = Workflow::new(literature.clone(), analyst)
            .with_events(event_tx.clone())
            .with_snapshots(snapshot_tx)
            .with_max_results(max_results);
        Self {
            workflow: Arc::new(Mutex::new(workflow)),
            literature,
            event_tx,
            max_results,
            snapshot_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.event_tx.subscribe()
    }

    /// Latest published state, current even mid-transition.
    pub fn snapshot(&self) -> WorkflowState {
        self.snapshot_rx.borrow().clone()
    }
}

pub type SharedState = Arc<AppState>;
