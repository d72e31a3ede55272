//! Collaborator traits the workflow controller drives.
//!
//! Production implementations live in `literature` (PubMed) and `analyst`
//! (LLM-backed); tests substitute mocks.

use async_trait::async_trait;
use evidyne_common::Result;
use evidyne_pubmed::{ArticleDetails, SearchHits};
use serde::{Deserialize, Serialize};

use crate::state::DocumentCandidate;

/// Citation search over an opaque literature index.
#[async_trait]
pub trait LiteratureService: Send + Sync {
    /// Total match count plus at most `max_results` document ids.
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchHits>;

    /// Full records for the given ids, in id order.
    async fn fetch_details(&self, ids: &[String]) -> Result<Vec<ArticleDetails>>;
}

/// Per-document output of the analysis call. Field names follow the JSON
/// keys the model is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub translated_title: String,
    pub translated_abstract: String,
    pub relevance_analysis: String,
}

impl DocumentAnalysis {
    /// Well-formed but content-free output counts as no output.
    pub fn is_empty(&self) -> bool {
        self.translated_title.trim().is_empty()
            && self.translated_abstract.trim().is_empty()
            && self.relevance_analysis.trim().is_empty()
    }
}

/// The three LLM-backed study operations.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Propose MeSH terms for a research topic.
    async fn extract_keywords(&self, topic: &str) -> Result<Vec<String>>;

    /// Translate and relevance-score one document against the topic.
    async fn analyze_document(
        &self,
        topic: &str,
        document: &DocumentCandidate,
    ) -> Result<DocumentAnalysis>;

    /// Write the narrative report over the adopted documents.
    async fn synthesize(&self, topic: &str, documents: &[DocumentCandidate]) -> Result<String>;
}
