//! LLM-backed implementation of `AnalysisService`.
//!
//! Three call shapes: MeSH extraction (JSON array of strings), per-document
//! translate-and-score (JSON object), narrative synthesis (plain text with
//! a reasoning budget). Extraction and analysis request structured output
//! and are decoded strictly: malformed JSON and well-formed-but-empty
//! results both fail as `MalformedLlmOutput` instead of degrading into
//! empty values silently.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use evidyne_common::{EvidyneError, Result};
use evidyne_llm::audit::LlmAuditEntry;
use evidyne_llm::{LlmBackend, LlmError, LlmRequest, Message};

use crate::service::{AnalysisService, DocumentAnalysis};
use crate::state::DocumentCandidate;

#[derive(Debug, Clone)]
pub struct AnalystConfig {
    /// Model used for extraction and per-document analysis.
    pub fast_model: String,
    /// Heavier model used for the final synthesis.
    pub synthesis_model: String,
    /// Target language for translations and the report.
    pub language: String,
    /// Reasoning budget forwarded on the synthesis call.
    pub synthesis_thinking_budget: Option<u32>,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            fast_model: "gemini-3-flash-preview".to_string(),
            synthesis_model: "gemini-3-pro-preview".to_string(),
            language: "Japanese".to_string(),
            synthesis_thinking_budget: Some(2000),
        }
    }
}

pub struct LlmAnalyst {
    backend: Arc<dyn LlmBackend>,
    config: AnalystConfig,
}

impl LlmAnalyst {
    pub fn new(backend: Arc<dyn LlmBackend>, config: AnalystConfig) -> Self {
        Self { backend, config }
    }

    async fn complete(&self, task: &str, req: LlmRequest) -> Result<String> {
        let t0 = Instant::now();
        let resp = self
            .backend
            .complete(req)
            .await
            .map_err(map_llm_error)?;
        let latency_ms = t0.elapsed().as_millis() as u64;
        LlmAuditEntry::from_response(task, self.backend.name(), &resp, latency_ms).record();
        Ok(resp.content)
    }
}

fn map_llm_error(err: LlmError) -> EvidyneError {
    match err {
        LlmError::Http(inner) => EvidyneError::Http(inner),
        LlmError::Serde(inner) => EvidyneError::Serialization(inner),
        LlmError::ApiError { status, message } => EvidyneError::Api { status, message },
    }
}

/// Models occasionally wrap JSON in a markdown fence despite the schema.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = match rest.split_once('\n') {
        Some((_info, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn decode_json<T: DeserializeOwned>(task: &str, raw: &str) -> Result<T> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| EvidyneError::MalformedLlmOutput(format!("{task}: {e}")))
}

fn synthesis_context(documents: &[DocumentCandidate]) -> String {
    documents
        .iter()
        .map(|d| {
            let analysis = d.relevance_analysis.as_deref().unwrap_or(&d.abstract_text);
            format!("Title: {}\nAnalysis: {}", d.title, analysis)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn user_message(content: String) -> Vec<Message> {
    vec![Message {
        role: "user".to_string(),
        content,
    }]
}

#[async_trait]
impl AnalysisService for LlmAnalyst {
    async fn extract_keywords(&self, topic: &str) -> Result<Vec<String>> {
        let prompt = format!(
            "Extract the most relevant Medical Subject Headings (MeSH terms) \
             from the following medical text/keywords. \
             Return ONLY a JSON array of strings. Text: \"{topic}\""
        );
        let mut req = LlmRequest::from_messages(user_message(prompt));
        req.model = Some(self.config.fast_model.clone());
        req.response_schema = Some(serde_json::json!({
            "type": "ARRAY",
            "items": { "type": "STRING" }
        }));

        let raw = self.complete("extract_keywords", req).await?;
        let terms: Vec<String> = decode_json("extract_keywords", &raw)?;
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        debug!(n = terms.len(), "keywords extracted");
        Ok(terms)
    }

    async fn analyze_document(
        &self,
        topic: &str,
        document: &DocumentCandidate,
    ) -> Result<DocumentAnalysis> {
        let prompt = format!(
            "Topic of Interest: {topic}\n\n\
             Analyze the following PubMed article:\n\
             Title: {title}\n\
             Abstract: {abstract_text}\n\n\
             Tasks:\n\
             1. Translate the Title and Abstract into professional medical {language}.\n\
             2. Analyze its relevance to the \"Topic of Interest\", in {language}.\n\n\
             Return as JSON with keys: translatedTitle, translatedAbstract, relevanceAnalysis.",
            title = document.title,
            abstract_text = document.abstract_text,
            language = self.config.language,
        );
        let mut req = LlmRequest::from_messages(user_message(prompt));
        req.model = Some(self.config.fast_model.clone());
        req.response_schema = Some(serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "translatedTitle":   { "type": "STRING" },
                "translatedAbstract": { "type": "STRING" },
                "relevanceAnalysis": { "type": "STRING" }
            },
            "required": ["translatedTitle", "translatedAbstract", "relevanceAnalysis"]
        }));

        let raw = self.complete("analyze_document", req).await?;
        let analysis: DocumentAnalysis = decode_json("analyze_document", &raw)?;
        if analysis.is_empty() {
            return Err(EvidyneError::MalformedLlmOutput(
                "analyze_document: all fields empty".into(),
            ));
        }
        Ok(analysis)
    }

    async fn synthesize(&self, topic: &str, documents: &[DocumentCandidate]) -> Result<String> {
        let prompt = format!(
            "You are a world-class medical researcher.\n\
             Synthesize a final report based on the following analyzed papers \
             and their relevance to the target topic: \"{topic}\".\n\
             The report should be in professional {language}, structured with an \
             Introduction, Key Findings from the selected evidence, Clinical \
             Implications, and a Conclusion.\n\n\
             Articles Data:\n{context}",
            language = self.config.language,
            context = synthesis_context(documents),
        );
        let mut req = LlmRequest::from_messages(user_message(prompt));
        req.model = Some(self.config.synthesis_model.clone());
        req.thinking_budget = self.config.synthesis_thinking_budget;

        self.complete("synthesize", req).await
    }
}
