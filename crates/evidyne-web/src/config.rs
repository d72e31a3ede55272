//! Configuration loading for Evidyne.
//! Reads evidyne.toml from the current directory or path in EVIDYNE_CONFIG
//! env var; a missing file falls back to defaults so the server can run
//! from environment variables alone.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pubmed: PubmedConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "127.0.0.1:3000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini" or "openai_compatible".
    #[serde(default = "default_provider")]
    pub provider: String,
    pub api_key: Option<String>,
    /// Base URL for the openai_compatible provider (Ollama, LM Studio, vLLM).
    pub base_url: Option<String>,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_synthesis_model")]
    pub synthesis_model: String,
    #[serde(default = "default_thinking_budget")]
    pub synthesis_thinking_budget: Option<u32>,
}

fn default_provider()        -> String { "gemini".to_string() }
fn default_fast_model()      -> String { "gemini-3-flash-preview".to_string() }
fn default_synthesis_model() -> String { "gemini-3-pro-preview".to_string() }
fn default_thinking_budget() -> Option<u32> { Some(2000) }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            base_url: None,
            fast_model: default_fast_model(),
            synthesis_model: default_synthesis_model(),
            synthesis_thinking_budget: default_thinking_budget(),
        }
    }
}

impl LlmConfig {
    /// Key from config, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("EVIDYNE_GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubmedConfig {
    /// Optional NCBI API key for the higher rate tier.
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize { 20 }

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Target language for translations and the synthesized report.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String { "Japanese".to_string() }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { language: default_language() }
    }
}

impl Config {
    /// Load configuration from evidyne.toml.
    /// Checks EVIDYNE_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("EVIDYNE_CONFIG").unwrap_or_else(|_| "evidyne.toml".to_string());

        if !Path::new(&path).exists() {
            warn!(path = %path, "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
