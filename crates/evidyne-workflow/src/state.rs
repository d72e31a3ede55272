//! The workflow state value object and its pure mutations.
//!
//! Everything here is synchronous and side-effect free; the async
//! orchestration around it lives in `engine`.

use evidyne_pubmed::ArticleDetails;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::DocumentAnalysis;

/// Abstract text used when PubMed has no abstract for a record.
pub const NO_ABSTRACT_PLACEHOLDER: &str = "No abstract available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    KeywordSelection,
    DocumentReview,
    Report,
}

/// A MeSH term proposed by keyword extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub id: Uuid,
    pub term: String,
    pub selected: bool,
}

impl KeywordCandidate {
    /// Extraction proposes terms pre-selected; the researcher prunes.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            term: term.into(),
            selected: true,
        }
    }
}

/// A retrieved paper under review, carrying the original record plus the
/// per-document analysis overlay once it has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCandidate {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub translated_title: Option<String>,
    pub translated_abstract: Option<String>,
    pub relevance_analysis: Option<String>,
    pub selected: bool,
    pub publication_date: Option<String>,
}

impl DocumentCandidate {
    /// Overlays analysis fields in place. A merged analysis never carries
    /// adoption with it.
    pub fn apply_analysis(&mut self, analysis: &DocumentAnalysis) {
        self.translated_title = Some(analysis.translated_title.clone());
        self.translated_abstract = Some(analysis.translated_abstract.clone());
        self.relevance_analysis = Some(analysis.relevance_analysis.clone());
        self.selected = false;
    }
}

impl From<ArticleDetails> for DocumentCandidate {
    fn from(details: ArticleDetails) -> Self {
        Self {
            id: details.id,
            title: details.title,
            abstract_text: details
                .abstract_text
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_ABSTRACT_PLACEHOLDER.to_string()),
            translated_title: None,
            translated_abstract: None,
            relevance_analysis: None,
            selected: false,
            publication_date: details.publication_date,
        }
    }
}

/// The single workflow instance. Serialized as-is for state snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub stage: Stage,
    pub topic: String,
    pub keywords: Vec<KeywordCandidate>,
    pub hit_count: u64,
    pub documents: Vec<DocumentCandidate>,
    pub busy: bool,
    pub busy_message: String,
    pub busy_progress: u8,
    pub report: String,
    /// Bumped on every change to the selected keyword set; hit-count
    /// results tagged with an older value are stale and discarded.
    #[serde(skip)]
    count_epoch: u64,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self {
            stage: Stage::Input,
            topic: String::new(),
            keywords: Vec::new(),
            hit_count: 0,
            documents: Vec::new(),
            busy: false,
            busy_message: String::new(),
            busy_progress: 0,
            report: String::new(),
            count_epoch: 0,
        }
    }

    pub fn selected_keywords(&self) -> Vec<&KeywordCandidate> {
        self.keywords.iter().filter(|k| k.selected).collect()
    }

    pub fn selected_documents(&self) -> Vec<&DocumentCandidate> {
        self.documents.iter().filter(|d| d.selected).collect()
    }

    /// Flips one keyword. Returns false if the id is unknown.
    pub(crate) fn toggle_keyword(&mut self, id: &Uuid) -> bool {
        match self.keywords.iter_mut().find(|k| &k.id == id) {
            Some(keyword) => {
                keyword.selected = !keyword.selected;
                true
            }
            None => false,
        }
    }

    /// Flips one document. Returns false if the id is unknown.
    pub(crate) fn toggle_document(&mut self, id: &str) -> bool {
        match self.documents.iter_mut().find(|d| d.id == id) {
            Some(document) => {
                document.selected = !document.selected;
                true
            }
            None => false,
        }
    }

    /// Select-all unless everything is already selected, then deselect-all.
    pub(crate) fn toggle_all_documents(&mut self) {
        let all_selected = self.documents.iter().all(|d| d.selected);
        for document in &mut self.documents {
            document.selected = !all_selected;
        }
    }

    pub(crate) fn bump_epoch(&mut self) -> u64 {
        self.count_epoch += 1;
        self.count_epoch
    }

    pub(crate) fn current_epoch(&self) -> u64 {
        self.count_epoch
    }

    /// Applies a hit count only if it belongs to the current epoch.
    /// Returns whether it was applied.
    pub(crate) fn apply_hit_count(&mut self, epoch: u64, count: u64) -> bool {
        if epoch != self.count_epoch {
            return false;
        }
        self.hit_count = count;
        true
    }

    pub(crate) fn begin_busy(&mut self, percent: u8, message: &str) {
        self.busy = true;
        self.busy_progress = percent.min(100);
        self.busy_message = message.to_string();
    }

    /// Progress never moves backwards within a run.
    pub(crate) fn update_progress(&mut self, percent: u8, message: &str) {
        self.busy_progress = self.busy_progress.max(percent.min(100));
        self.busy_message = message.to_string();
    }

    pub(crate) fn clear_busy(&mut self) {
        self.busy = false;
        self.busy_progress = 0;
        self.busy_message.clear();
    }

    /// Back to a pristine Input stage. In-flight hit counts from the old
    /// life are invalidated by the epoch bump.
    pub(crate) fn restart(&mut self) {
        let epoch = self.count_epoch + 1;
        *self = Self::new();
        self.count_epoch = epoch;
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, selected: bool) -> DocumentCandidate {
        DocumentCandidate {
            id: id.into(),
            title: format!("Paper {id}"),
            abstract_text: "text".into(),
            translated_title: None,
            translated_abstract: None,
            relevance_analysis: None,
            selected,
            publication_date: None,
        }
    }

    #[test]
    fn test_toggle_keyword_flips_and_reports_unknown_ids() {
        let mut state = WorkflowState::new();
        state.keywords = vec![KeywordCandidate::new("Heart Failure")];
        let id = state.keywords[0].id;

        assert!(state.toggle_keyword(&id));
        assert!(!state.keywords[0].selected);
        assert!(state.toggle_keyword(&id));
        assert!(state.keywords[0].selected);
        assert!(!state.toggle_keyword(&Uuid::new_v4()));
    }

    #[test]
    fn test_toggle_all_selects_unless_uniformly_selected() {
        let mut state = WorkflowState::new();
        state.documents = vec![doc("1", true), doc("2", false)];

        state.toggle_all_documents();
        assert!(state.documents.iter().all(|d| d.selected));

        state.toggle_all_documents();
        assert!(state.documents.iter().all(|d| !d.selected));

        // double application from a uniform start is the identity
        state.toggle_all_documents();
        state.toggle_all_documents();
        assert!(state.documents.iter().all(|d| !d.selected));
    }

    #[test]
    fn test_toggle_all_on_empty_list_is_a_noop() {
        let mut state = WorkflowState::new();
        state.toggle_all_documents();
        assert!(state.documents.is_empty());
    }

    #[test]
    fn test_stale_hit_counts_are_discarded() {
        let mut state = WorkflowState::new();
        let old = state.bump_epoch();
        let current = state.bump_epoch();

        assert!(state.apply_hit_count(current, 12));
        assert_eq!(state.hit_count, 12);
        assert!(!state.apply_hit_count(old, 99));
        assert_eq!(state.hit_count, 12);
    }

    #[test]
    fn test_progress_is_monotone_within_a_run() {
        let mut state = WorkflowState::new();
        state.begin_busy(20, "start");
        state.update_progress(60, "later");
        state.update_progress(40, "out of order");
        assert_eq!(state.busy_progress, 60);

        state.clear_busy();
        assert_eq!(state.busy_progress, 0);

        // a new run starts from its own baseline
        state.begin_busy(5, "again");
        assert_eq!(state.busy_progress, 5);
    }

    #[test]
    fn test_analysis_overlay_resets_selection() {
        let mut document = doc("1", true);
        document.apply_analysis(&DocumentAnalysis {
            translated_title: "T".into(),
            translated_abstract: "A".into(),
            relevance_analysis: "R".into(),
        });
        assert!(!document.selected);
        assert_eq!(document.translated_title.as_deref(), Some("T"));
        assert_eq!(document.title, "Paper 1");
    }

    #[test]
    fn test_missing_abstract_gets_placeholder() {
        let candidate = DocumentCandidate::from(ArticleDetails {
            id: "7".into(),
            title: "No abstract paper".into(),
            abstract_text: None,
            publication_date: Some("2024".into()),
        });
        assert_eq!(candidate.abstract_text, NO_ABSTRACT_PLACEHOLDER);
        assert!(!candidate.selected);
        assert_eq!(candidate.publication_date.as_deref(), Some("2024"));
    }

    #[test]
    fn test_restart_resets_everything_but_advances_the_epoch() {
        let mut state = WorkflowState::new();
        state.stage = Stage::Report;
        state.topic = "x".into();
        state.keywords = vec![KeywordCandidate::new("t")];
        state.documents = vec![doc("1", true)];
        state.hit_count = 9;
        state.report = "body".into();
        let epoch = state.bump_epoch();

        state.restart();
        assert_eq!(state.stage, Stage::Input);
        assert!(state.topic.is_empty());
        assert!(state.keywords.is_empty());
        assert!(state.documents.is_empty());
        assert_eq!(state.hit_count, 0);
        assert!(state.report.is_empty());
        assert!(!state.apply_hit_count(epoch, 5), "pre-restart counts are stale");
    }
}
