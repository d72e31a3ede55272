//! Audit trail for LLM calls.
//!
//! Every completed backend call yields one [`LlmAuditEntry`] on the
//! `evidyne::llm_audit` tracing target. The subscriber decides where the
//! trail ends up; the entry itself never stores raw model output, only a
//! SHA-256 digest of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::backend::LlmResponse;

/// One audited call: which task asked, what it cost, and a fingerprint of
/// what came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    pub task: String,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: DateTime<Utc>,
}

impl LlmAuditEntry {
    /// Builds an entry from a finished response. `backend` is the backend's
    /// stable name, not the model id, so the trail survives model swaps.
    pub fn from_response(
        task: impl Into<String>,
        backend: &str,
        response: &LlmResponse,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            model: response.model.clone(),
            backend: backend.to_string(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            output_hash: format!("{:x}", Sha256::digest(response.content.as_bytes())),
            latency_ms,
            called_at: Utc::now(),
        }
    }

    /// Emits the entry to the audit log target.
    pub fn record(&self) {
        tracing::info!(
            target: "evidyne::llm_audit",
            id = %self.id,
            task = %self.task,
            model = %self.model,
            backend = %self.backend,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            "llm call audited"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content: &str) -> LlmResponse {
        LlmResponse {
            content: content.to_string(),
            model: "test-model".to_string(),
            prompt_tokens: 12,
            completion_tokens: 3,
        }
    }

    #[test]
    fn test_hash_depends_only_on_output_text() {
        let a = LlmAuditEntry::from_response("synthesize", "gemini", &response("report"), 5);
        let b = LlmAuditEntry::from_response("synthesize", "gemini", &response("report"), 9);
        assert_eq!(a.output_hash, b.output_hash);
        assert_ne!(a.id, b.id);

        let c = LlmAuditEntry::from_response("synthesize", "gemini", &response("other"), 5);
        assert_ne!(a.output_hash, c.output_hash);
    }
}
