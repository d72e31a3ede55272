//! The workflow controller.
//!
//! Owns the state value and the two collaborators, and runs the staged
//! transitions:
//!   1. submit_topic:      Input → KeywordSelection (keyword extraction)
//!   2. proceed_to_review: KeywordSelection → DocumentReview (search,
//!      detail fetch, per-document analysis)
//!   3. synthesize:        DocumentReview → Report (narrative synthesis)
//!
//! Exactly one transition may run at a time; the busy flag spans every
//! external call sequence. Failures abort the transition, clear the busy
//! flag, emit a single failure event, and leave the stage unchanged.
//! Per-document analysis failures are the exception: the document keeps
//! its original fields and the batch continues.
//!
//! Keyword hit counts run outside the busy gate: toggles hand back a
//! `CountTicket` so the search can run off-lock, and results are applied
//! last-write-wins by epoch.
//!
//! Every mutation also mirrors the state into an optional watch channel,
//! so readers never contend with a running transition.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use evidyne_common::EvidyneError;
use evidyne_pubmed::SearchHits;

use crate::error::WorkflowError;
use crate::export::{build_report_export, ReportExport};
use crate::progress::WorkflowEvent;
use crate::query::build_search_query;
use crate::service::{AnalysisService, LiteratureService};
use crate::state::{DocumentCandidate, KeywordCandidate, Stage, WorkflowState};

const DEFAULT_MAX_RESULTS: usize = 20;

/// Claim on a hit-count recompute: the query to run and the epoch that
/// must still be current when the result lands.
#[derive(Debug, Clone)]
pub struct CountTicket {
    pub epoch: u64,
    pub query: String,
}

pub struct Workflow {
    state: WorkflowState,
    literature: Arc<dyn LiteratureService>,
    analyst: Arc<dyn AnalysisService>,
    events: Option<broadcast::Sender<WorkflowEvent>>,
    snapshots: Option<watch::Sender<WorkflowState>>,
    max_results: usize,
}

impl Workflow {
    pub fn new(literature: Arc<dyn LiteratureService>, analyst: Arc<dyn AnalysisService>) -> Self {
        Self {
            state: WorkflowState::new(),
            literature,
            analyst,
            events: None,
            snapshots: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_events(mut self, tx: broadcast::Sender<WorkflowEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Mirror every state change into a watch channel for lock-free readers.
    pub fn with_snapshots(mut self, tx: watch::Sender<WorkflowState>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.clone()
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn publish(&self) {
        if let Some(ref tx) = self.snapshots {
            tx.send_replace(self.state.clone());
        }
    }

    fn start(&mut self, percent: u8, message: &str) {
        self.state.begin_busy(percent, message);
        self.emit(WorkflowEvent::Progress {
            percent,
            message: message.to_string(),
        });
        self.publish();
    }

    fn set_progress(&mut self, percent: u8, message: &str) {
        self.state.update_progress(percent, message);
        self.emit(WorkflowEvent::Progress {
            percent: self.state.busy_progress,
            message: message.to_string(),
        });
        self.publish();
    }

    fn enter_stage(&mut self, stage: Stage) {
        self.state.stage = stage;
        self.state.clear_busy();
        self.emit(WorkflowEvent::StageChanged { stage });
        self.publish();
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        warn!(kind = err.kind(), error = %err, "transition aborted");
        self.state.clear_busy();
        self.emit(WorkflowEvent::TransitionFailed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.publish();
        err
    }

    fn guard_idle(&self, expected: Stage) -> Result<(), WorkflowError> {
        if self.state.busy {
            return Err(WorkflowError::Busy);
        }
        if self.state.stage != expected {
            return Err(WorkflowError::WrongStage(self.state.stage));
        }
        Ok(())
    }

    // ── Input → KeywordSelection ──────────────────────────────────────────────

    /// Extract a keyword strategy for the topic. Replaces any previous
    /// keyword set; every proposed term starts selected, and the hit count
    /// resets until a recount lands.
    #[instrument(skip(self, topic))]
    pub async fn submit_topic(&mut self, topic: &str) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::Input)?;
        let topic = topic.trim().to_string();
        if topic.is_empty() {
            return Err(WorkflowError::EmptyTopic);
        }

        self.start(20, "Extracting keyword strategy…");
        info!(topic = %topic, "starting keyword extraction");

        let terms = match self.analyst.extract_keywords(&topic).await {
            Ok(terms) => terms,
            Err(e) => return Err(self.fail(WorkflowError::Extraction(e))),
        };
        if terms.is_empty() {
            let e = EvidyneError::MalformedLlmOutput("extraction produced no keywords".into());
            return Err(self.fail(WorkflowError::Extraction(e)));
        }

        self.state.topic = topic;
        self.state.keywords = terms.into_iter().map(KeywordCandidate::new).collect();
        self.state.hit_count = 0;
        self.state.bump_epoch();
        self.set_progress(100, "Keyword strategy ready");
        self.enter_stage(Stage::KeywordSelection);
        Ok(())
    }

    // ── Keyword selection ─────────────────────────────────────────────────────

    /// Flip one keyword. An emptied selection zeroes the hit count right
    /// away; otherwise the caller gets a ticket to run the recount with.
    pub fn toggle_keyword(&mut self, id: &Uuid) -> Result<Option<CountTicket>, WorkflowError> {
        self.guard_idle(Stage::KeywordSelection)?;
        if !self.state.toggle_keyword(id) {
            return Err(WorkflowError::UnknownId(id.to_string()));
        }
        self.state.bump_epoch();
        let ticket = self.count_ticket();
        if ticket.is_none() {
            self.state.apply_hit_count(self.state.current_epoch(), 0);
            self.emit(WorkflowEvent::HitCount { count: 0 });
        }
        self.publish();
        Ok(ticket)
    }

    /// Ticket for the current selection, None when nothing is selected.
    pub fn count_ticket(&self) -> Option<CountTicket> {
        let query = build_search_query(&self.state.keywords);
        if query.is_empty() {
            None
        } else {
            Some(CountTicket {
                epoch: self.state.current_epoch(),
                query,
            })
        }
    }

    /// Apply a recount result. Stale tickets (an older epoch) are
    /// discarded; returns whether the count was applied.
    pub fn apply_hit_count(&mut self, ticket: &CountTicket, count: u64) -> bool {
        let applied = self.state.apply_hit_count(ticket.epoch, count);
        if applied {
            self.emit(WorkflowEvent::HitCount { count });
            self.publish();
        }
        applied
    }

    /// Recompute the hit count inline. Web callers prefer the ticket API
    /// so the search runs outside the session lock; this is for
    /// sequential callers. A failed count search logs and reports zero.
    pub async fn refresh_hit_count(&mut self) {
        let ticket = match self.count_ticket() {
            Some(ticket) => ticket,
            None => {
                if self.state.apply_hit_count(self.state.current_epoch(), 0) {
                    self.emit(WorkflowEvent::HitCount { count: 0 });
                    self.publish();
                }
                return;
            }
        };
        let count = match self.literature.search(&ticket.query, self.max_results).await {
            Ok(hits) => hits.count,
            Err(e) => {
                warn!(error = %e, "hit-count search failed, reporting zero");
                0
            }
        };
        self.apply_hit_count(&ticket, count);
    }

    // ── KeywordSelection → DocumentReview ─────────────────────────────────────

    /// Search with the selected keywords, fetch the merged records, and
    /// run per-document analysis. Analysis failures degrade the single
    /// document; search and fetch failures abort.
    #[instrument(skip(self))]
    pub async fn proceed_to_review(&mut self) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::KeywordSelection)?;
        if self.state.hit_count == 0 {
            return Err(WorkflowError::NoHits);
        }

        self.start(5, "Searching PubMed…");
        let query = build_search_query(&self.state.keywords);
        let hits = if query.is_empty() {
            SearchHits { count: 0, ids: Vec::new() }
        } else {
            match self.literature.search(&query, self.max_results).await {
                Ok(hits) => hits,
                Err(e) => return Err(self.fail(WorkflowError::Retrieval(e))),
            }
        };

        self.set_progress(20, &format!("Fetching details for {} documents…", hits.ids.len()));
        let details = match self.literature.fetch_details(&hits.ids).await {
            Ok(details) => details,
            Err(e) => return Err(self.fail(WorkflowError::Retrieval(e))),
        };
        self.state.documents = details.into_iter().map(DocumentCandidate::from).collect();

        let topic = self.state.topic.clone();
        let total = self.state.documents.len();
        for index in 0..total {
            let percent = 20 + ((75 * (index + 1)) / total) as u8;
            self.set_progress(
                percent,
                &format!("Analyzing document {} of {}…", index + 1, total),
            );

            let document = self.state.documents[index].clone();
            match self.analyst.analyze_document(&topic, &document).await {
                Ok(analysis) => {
                    if let Some(doc) = self.state.documents.get_mut(index) {
                        doc.apply_analysis(&analysis);
                    }
                    self.emit(WorkflowEvent::DocumentAnalyzed {
                        id: document.id,
                        index,
                        total,
                        degraded: false,
                    });
                }
                Err(e) => {
                    let err = WorkflowError::Analysis(e);
                    warn!(pmid = %document.id, error = %err, "keeping original fields");
                    self.emit(WorkflowEvent::DocumentAnalyzed {
                        id: document.id,
                        index,
                        total,
                        degraded: true,
                    });
                }
            }
        }

        self.set_progress(100, "Document review ready");
        self.enter_stage(Stage::DocumentReview);
        Ok(())
    }

    // ── Document review ───────────────────────────────────────────────────────

    pub fn toggle_document(&mut self, id: &str) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::DocumentReview)?;
        if !self.state.toggle_document(id) {
            return Err(WorkflowError::UnknownId(id.to_string()));
        }
        self.publish();
        Ok(())
    }

    pub fn toggle_all_documents(&mut self) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::DocumentReview)?;
        self.state.toggle_all_documents();
        self.publish();
        Ok(())
    }

    // ── DocumentReview → Report ───────────────────────────────────────────────

    /// Synthesize the narrative report over the adopted documents.
    #[instrument(skip(self))]
    pub async fn synthesize(&mut self) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::DocumentReview)?;
        let selected: Vec<DocumentCandidate> = self
            .state
            .selected_documents()
            .into_iter()
            .cloned()
            .collect();
        if selected.is_empty() {
            return Err(WorkflowError::NoDocumentsSelected);
        }

        self.start(30, "Synthesizing evidence report…");
        info!(documents = selected.len(), "starting report synthesis");

        let topic = self.state.topic.clone();
        let report = match self.analyst.synthesize(&topic, &selected).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(WorkflowError::Synthesis(e))),
        };
        if report.trim().is_empty() {
            let e = EvidyneError::MalformedLlmOutput("synthesis produced an empty report".into());
            return Err(self.fail(WorkflowError::Synthesis(e)));
        }

        self.state.report = report;
        self.set_progress(100, "Report ready");
        self.enter_stage(Stage::Report);
        Ok(())
    }

    // ── Returning to Input ────────────────────────────────────────────────────

    /// From Report: discard everything and start over.
    pub fn restart(&mut self) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::Report)?;
        self.state.restart();
        self.emit(WorkflowEvent::StageChanged { stage: Stage::Input });
        self.publish();
        Ok(())
    }

    /// From KeywordSelection: back to Input with everything preserved, so
    /// the topic can be refined and resubmitted.
    pub fn back_to_input(&mut self) -> Result<(), WorkflowError> {
        self.guard_idle(Stage::KeywordSelection)?;
        self.state.stage = Stage::Input;
        self.emit(WorkflowEvent::StageChanged { stage: Stage::Input });
        self.publish();
        Ok(())
    }

    // ── Export ────────────────────────────────────────────────────────────────

    /// Plain-text export of the finished report.
    pub fn export_report(&self) -> Result<ReportExport, WorkflowError> {
        if self.state.stage != Stage::Report {
            return Err(WorkflowError::WrongStage(self.state.stage));
        }
        Ok(build_report_export(&self.state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use evidyne_common::Result;
    use evidyne_pubmed::ArticleDetails;

    use crate::service::DocumentAnalysis;

    struct NullLiterature;

    #[async_trait]
    impl LiteratureService for NullLiterature {
        async fn search(&self, _query: &str, _max_results: usize) -> Result<SearchHits> {
            Ok(SearchHits {
                count: 0,
                ids: Vec::new(),
            })
        }

        async fn fetch_details(&self, _ids: &[String]) -> Result<Vec<ArticleDetails>> {
            Ok(Vec::new())
        }
    }

    struct NullAnalyst;

    #[async_trait]
    impl AnalysisService for NullAnalyst {
        async fn extract_keywords(&self, _topic: &str) -> Result<Vec<String>> {
            Ok(vec!["term".into()])
        }

        async fn analyze_document(
            &self,
            _topic: &str,
            _document: &DocumentCandidate,
        ) -> Result<DocumentAnalysis> {
            Ok(DocumentAnalysis {
                translated_title: "t".into(),
                translated_abstract: "a".into(),
                relevance_analysis: "r".into(),
            })
        }

        async fn synthesize(
            &self,
            _topic: &str,
            _documents: &[DocumentCandidate],
        ) -> Result<String> {
            Ok("report".into())
        }
    }

    fn workflow() -> Workflow {
        Workflow::new(Arc::new(NullLiterature), Arc::new(NullAnalyst))
    }

    #[tokio::test]
    async fn test_busy_workflow_rejects_every_operation() {
        let mut wf = workflow();
        wf.state.begin_busy(10, "running");

        assert!(matches!(wf.submit_topic("x").await, Err(WorkflowError::Busy)));
        assert!(matches!(
            wf.toggle_keyword(&Uuid::new_v4()),
            Err(WorkflowError::Busy)
        ));
        assert!(matches!(wf.proceed_to_review().await, Err(WorkflowError::Busy)));
        assert!(matches!(wf.toggle_document("1"), Err(WorkflowError::Busy)));
        assert!(matches!(wf.synthesize().await, Err(WorkflowError::Busy)));
        assert!(matches!(wf.restart(), Err(WorkflowError::Busy)));
    }

    #[test]
    fn test_count_ticket_requires_a_selection() {
        let wf = workflow();
        assert!(wf.count_ticket().is_none());
    }
}
