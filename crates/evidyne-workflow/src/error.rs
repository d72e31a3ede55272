use evidyne_common::EvidyneError;
use thiserror::Error;

use crate::state::Stage;

/// Failures surfaced by workflow transitions. The first four wrap the
/// external call that broke; the rest are guard rejections that leave the
/// state untouched.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("keyword extraction failed: {0}")]
    Extraction(#[source] EvidyneError),

    #[error("document retrieval failed: {0}")]
    Retrieval(#[source] EvidyneError),

    #[error("document analysis failed: {0}")]
    Analysis(#[source] EvidyneError),

    #[error("report synthesis failed: {0}")]
    Synthesis(#[source] EvidyneError),

    #[error("a transition is already running")]
    Busy,

    #[error("operation not available in the {0:?} stage")]
    WrongStage(Stage),

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("search returned no hits for the selected keywords")]
    NoHits,

    #[error("no documents selected")]
    NoDocumentsSelected,

    #[error("unknown candidate id: {0}")]
    UnknownId(String),
}

impl WorkflowError {
    /// Short machine-readable kind, used in emitted failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Extraction(_) => "extraction",
            WorkflowError::Retrieval(_) => "retrieval",
            WorkflowError::Analysis(_) => "analysis",
            WorkflowError::Synthesis(_) => "synthesis",
            _ => "rejected",
        }
    }

    /// True for guard rejections, false for failed external calls.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WorkflowError::Busy
                | WorkflowError::WrongStage(_)
                | WorkflowError::EmptyTopic
                | WorkflowError::NoHits
                | WorkflowError::NoDocumentsSelected
                | WorkflowError::UnknownId(_)
        )
    }
}
