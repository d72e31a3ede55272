//! evidyne-workflow — the four-stage evidence workflow.
//!
//! Stages: Input → KeywordSelection → DocumentReview → Report.
//! The controller owns a serializable state value and two collaborator
//! traits (literature search, LLM analysis); transitions run the external
//! call sequences, emit progress over a broadcast channel, and reject
//! guard violations with typed errors while leaving state untouched.

pub mod analyst;
pub mod engine;
pub mod error;
pub mod export;
pub mod literature;
pub mod progress;
pub mod query;
pub mod service;
pub mod state;

pub use analyst::{AnalystConfig, LlmAnalyst};
pub use engine::{CountTicket, Workflow};
pub use error::WorkflowError;
pub use export::ReportExport;
pub use literature::PubMedLiterature;
pub use progress::WorkflowEvent;
pub use service::{AnalysisService, DocumentAnalysis, LiteratureService};
pub use state::{DocumentCandidate, KeywordCandidate, Stage, WorkflowState};
