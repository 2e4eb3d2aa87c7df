//! Liveness/readiness probe. Never requires a bearer token.

use aletheia_memory_core::backend::Tier;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

fn tier_name(tier: Tier) -> &'static str {
    match tier {
        Tier::AnthropicOAuth => "anthropic_oauth",
        Tier::AnthropicApiKey => "anthropic_api_key",
        Tier::Ollama => "ollama",
        Tier::None => "none",
    }
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let backend = state.engine.backend();
    let graph_ok = state.engine.graph_available().await;
    let vector_ok = state.engine.vector_available().await;

    Json(json!({
        "ok": graph_ok && vector_ok,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "llm": {
            "tier": tier_name(backend.tier),
            "provider": match backend.tier {
                Tier::AnthropicOAuth | Tier::AnthropicApiKey => "anthropic",
                Tier::Ollama => "ollama",
                Tier::None => "none",
            },
            "model": backend.model,
            "extraction_enabled": backend.extraction_enabled(),
        },
        "checks": {
            "qdrant": vector_ok,
            "embedder": !state.engine.config().voyage_api_key.is_empty(),
            "neo4j": graph_ok,
        },
    }))
}
