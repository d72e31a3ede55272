//! Chat-completion backends.
//!
//! Two wire formats cover every deployment we target: Google's
//! `generateContent` API for the hosted Gemini models, and the OpenAI
//! chat-completions shape for everything else (OpenAI itself, LMStudio,
//! Groq, OpenRouter, vLLM, …).
//!
//! A request may carry a JSON response schema. Gemini enforces it
//! server-side through `responseSchema`; OpenAI-style endpoints are only
//! switched into JSON object mode, and the caller validates the shape on
//! decode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend returned {status}: {message}")]
    ApiError { status: u16, message: String },
}

// ── Requests and responses ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user" or "assistant".
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// JSON schema the completion must conform to. Backends without native
    /// schema support still switch the endpoint into JSON output mode.
    pub response_schema: Option<serde_json::Value>,
    /// Reasoning token budget, forwarded where the API supports one.
    pub thinking_budget: Option<u32>,
}

impl LlmRequest {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            max_tokens: None,
            temperature: None,
            response_schema: None,
            thinking_budget: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

// ── Backend trait ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError>;
    /// Stable backend label for logs and audit entries.
    fn name(&self) -> &'static str;
    fn model_id(&self) -> &str;
    fn is_local(&self) -> bool;
}

// ── Wire helpers ──────────────────────────────────────────────────────────────

/// Reads the response body as JSON, turning HTTP-level failures into
/// [`LlmError::ApiError`] with whatever message the endpoint provided.
async fn read_api_json(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = resp.status().as_u16();
    let body: serde_json::Value = resp.json().await?;
    if status < 400 {
        return Ok(body);
    }
    // Gemini nests the message under `error`; some OpenAI-compatible
    // servers put it at the top level.
    let message = body["error"]["message"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .unwrap_or("no error message in response")
        .to_string();
    Err(LlmError::ApiError { status, message })
}

fn token_count(usage: &serde_json::Value, field: &str) -> u32 {
    usage[field].as_u64().unwrap_or(0) as u32
}

fn decode_chat_completion(body: &serde_json::Value, default_model: &str) -> LlmResponse {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();
    let model = match body["model"].as_str() {
        Some(reported) => reported.to_string(),
        None => default_model.to_string(),
    };
    LlmResponse {
        content,
        model,
        prompt_tokens: token_count(&body["usage"], "prompt_tokens"),
        completion_tokens: token_count(&body["usage"], "completion_tokens"),
    }
}

// ── Google Gemini ─────────────────────────────────────────────────────────────

pub struct GeminiBackend {
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

/// Splits a chat transcript into Gemini's `systemInstruction` text and its
/// role-tagged `contents` array. Gemini calls the assistant role "model";
/// if several system messages appear, the first one wins.
fn gemini_contents(messages: &[Message]) -> (Option<String>, Vec<serde_json::Value>) {
    let mut system = None;
    let mut contents = Vec::with_capacity(messages.len());
    for msg in messages {
        if msg.role == "system" {
            system.get_or_insert_with(|| msg.content.clone());
            continue;
        }
        let role = if msg.role == "assistant" { "model" } else { "user" };
        contents.push(serde_json::json!({
            "role": role,
            "parts": [{ "text": msg.content }],
        }));
    }
    (system, contents)
}

fn gemini_generation_config(req: &LlmRequest) -> serde_json::Value {
    let mut config = serde_json::json!({
        "maxOutputTokens": req.max_tokens.unwrap_or(4096),
        "temperature": req.temperature.unwrap_or(0.1),
    });
    if let Some(schema) = &req.response_schema {
        config["responseMimeType"] = serde_json::Value::String("application/json".to_string());
        config["responseSchema"] = schema.clone();
    }
    if let Some(budget) = req.thinking_budget {
        config["thinkingConfig"] = serde_json::json!({ "thinkingBudget": budget });
    }
    config
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = req.model.as_deref().unwrap_or(&self.model).to_string();
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, self.api_key
        );

        let (system, contents) = gemini_contents(&req.messages);
        let mut payload = serde_json::json!({
            "contents": contents,
            "generationConfig": gemini_generation_config(&req),
        });
        if let Some(text) = system {
            payload["systemInstruction"] = serde_json::json!({ "parts": [{ "text": text }] });
        }

        let resp = self.client.post(&url).json(&payload).send().await?;
        let body = read_api_json(resp).await?;

        let usage = &body["usageMetadata"];
        Ok(LlmResponse {
            content: body["candidates"][0]["content"]["parts"][0]["text"]
                .as_str()
                .unwrap_or("")
                .to_string(),
            model,
            prompt_tokens: token_count(usage, "promptTokenCount"),
            completion_tokens: token_count(usage, "candidatesTokenCount"),
        })
    }

    fn name(&self) -> &'static str { "gemini" }
    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool { false }
}

// ── OpenAI-compatible endpoints ───────────────────────────────────────────────

pub struct OpenAiCompatibleBackend {
    pub base_url: String,
    pub model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatibleBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.api_key {
            builder.bearer_auth(key)
        } else {
            builder
        }
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatibleBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let mut payload = serde_json::json!({
            "model": req.model.as_deref().unwrap_or(&self.model),
            "messages": req.messages,
            "max_tokens": req.max_tokens.unwrap_or(4096),
            "temperature": req.temperature.unwrap_or(0.1),
        });
        // No schema enforcement on this wire format; request a JSON object
        // and leave shape validation to the caller.
        if req.response_schema.is_some() {
            payload["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        let resp = self.with_auth(self.client.post(&url)).json(&payload).send().await?;
        let body = read_api_json(resp).await?;
        Ok(decode_chat_completion(&body, &self.model))
    }

    fn name(&self) -> &'static str { "openai_compatible" }
    fn model_id(&self) -> &str { &self.model }
    fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_is_a_remote_backend() {
        let b = GeminiBackend::new("AIza-test", "gemini-3-flash-preview");
        assert!(!b.is_local());
        assert_eq!(b.name(), "gemini");
        assert_eq!(b.model_id(), "gemini-3-flash-preview");
    }

    #[test]
    fn test_localhost_endpoint_counts_as_local() {
        let local = OpenAiCompatibleBackend::new("http://localhost:1234", "local-model", None);
        assert!(local.is_local());
        assert_eq!(local.model_id(), "local-model");

        let key = Some("gsk-test".to_string());
        let remote =
            OpenAiCompatibleBackend::new("https://api.groq.com/openai", "llama-3.3-70b", key);
        assert!(!remote.is_local());
        assert_eq!(remote.name(), "openai_compatible");
    }

    #[test]
    fn test_system_prompt_splits_out_of_contents() {
        let msgs = vec![
            Message { role: "system".into(), content: "be brief".into() },
            Message { role: "user".into(), content: "hi".into() },
            Message { role: "assistant".into(), content: "hello".into() },
        ];
        let (system, contents) = gemini_contents(&msgs);
        assert_eq!(system.as_deref(), Some("be brief"));
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
    }

    #[test]
    fn test_generation_config_plain_text() {
        let req = LlmRequest::from_messages(vec![Message {
            role: "user".into(),
            content: "hi".into(),
        }]);
        let config = gemini_generation_config(&req);
        assert!(config.get("responseMimeType").is_none());
        assert!(config.get("thinkingConfig").is_none());
    }

    #[test]
    fn test_generation_config_structured_output() {
        let mut req = LlmRequest::from_messages(vec![Message {
            role: "user".into(),
            content: "hi".into(),
        }]);
        req.response_schema = Some(serde_json::json!({
            "type": "ARRAY", "items": { "type": "STRING" }
        }));
        req.thinking_budget = Some(2000);
        let config = gemini_generation_config(&req);
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "ARRAY");
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 2000);
    }

    #[test]
    fn test_chat_completion_decode_fills_defaults() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": "ok" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
        });
        let resp = decode_chat_completion(&body, "fallback");
        assert_eq!(resp.content, "ok");
        assert_eq!(resp.model, "fallback");
        assert_eq!(resp.prompt_tokens, 12);
        assert_eq!(resp.completion_tokens, 3);
    }
}
