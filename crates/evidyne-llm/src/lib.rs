//! evidyne-llm — LLM backend abstraction layer.
//! Implements the LlmBackend trait over the Gemini API and any
//! OpenAI-compatible endpoint, plus per-call audit entries.

pub mod audit;
pub mod backend;

pub use backend::{
    GeminiBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OpenAiCompatibleBackend,
};
