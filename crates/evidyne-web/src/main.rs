//! Evidyne Web Server
//!
//! Run with: cargo run -p evidyne-web

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use evidyne_llm::{GeminiBackend, LlmBackend, OpenAiCompatibleBackend};
use evidyne_web::config::Config;
use evidyne_web::router::build_router;
use evidyne_web::state::AppState;
use evidyne_workflow::{AnalystConfig, LiteratureService, LlmAnalyst, PubMedLiterature};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("evidyne=debug,info")),
        )
        .init();

    info!("Starting Evidyne Web Server...");

    let config = Config::load()?;

    let backend: Arc<dyn LlmBackend> = match config.llm.provider.as_str() {
        "gemini" => {
            let api_key = config.llm.resolve_api_key().context(
                "no Gemini API key: set [llm].api_key or EVIDYNE_GEMINI_API_KEY",
            )?;
            Arc::new(GeminiBackend::new(api_key, config.llm.fast_model.clone()))
        }
        "openai_compatible" => {
            let base_url = config
                .llm
                .base_url
                .clone()
                .context("[llm].base_url is required for the openai_compatible provider")?;
            Arc::new(OpenAiCompatibleBackend::new(
                base_url,
                config.llm.fast_model.clone(),
                config.llm.resolve_api_key(),
            ))
        }
        other => anyhow::bail!("unknown llm provider: {other}"),
    };
    info!(provider = %config.llm.provider, local = backend.is_local(), "LLM backend ready");

    let analyst = Arc::new(LlmAnalyst::new(
        backend,
        AnalystConfig {
            fast_model: config.llm.fast_model.clone(),
            synthesis_model: config.llm.synthesis_model.clone(),
            language: config.analysis.language.clone(),
            synthesis_thinking_budget: config.llm.synthesis_thinking_budget,
        },
    ));
    let literature: Arc<dyn LiteratureService> =
        Arc::new(PubMedLiterature::new(config.pubmed.api_key.clone())?);

    let state = AppState::new(literature, analyst, config.pubmed.max_results);
    let app = build_router(state);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid [server].bind address: {}", config.server.bind))?;
    info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
