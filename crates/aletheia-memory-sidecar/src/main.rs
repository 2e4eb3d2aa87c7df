//! Aletheia memory sidecar: HTTP surface over the ingestion, retrieval,
//! temporal, evolution and analytics engines.

mod error;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aletheia_memory_core::backend::{self, DetectedBackend};
use aletheia_memory_core::embedding::EmbeddingClient;
use aletheia_memory_core::llm::LlmClient;
use aletheia_memory_core::storage::{GraphGateway, Neo4jGateway, QdrantGateway, VectorGateway};
use aletheia_memory_core::{MemoryEngine, SidecarConfig};
use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "aletheia-memory-sidecar", version, about = "HTTP surface for the Aletheia memory substrate")]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0:8420")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("aletheia-memory-sidecar v{} starting", env!("CARGO_PKG_VERSION"));

    let config = SidecarConfig::from_env();

    let backend = backend::detect_backend(&config).await;
    info!(tier = ?backend.tier, model = ?backend.model, "llm backend detected");

    let graph = match Neo4jGateway::connect(&config.neo4j_url, &config.neo4j_user, &config.neo4j_password).await {
        Ok(g) => Arc::new(g) as Arc<dyn GraphGateway>,
        Err(e) => {
            error!(error = %e, "failed to connect to neo4j");
            std::process::exit(1);
        }
    };

    let vector = match QdrantGateway::connect(&config.qdrant_host, config.qdrant_port) {
        Ok(v) => {
            if let Err(e) = v.ensure_collection().await {
                warn!(error = %e, "qdrant collection not ready yet, continuing in degraded mode");
            }
            Arc::new(v) as Arc<dyn VectorGateway>
        }
        Err(e) => {
            error!(error = %e, "failed to construct qdrant gateway");
            std::process::exit(1);
        }
    };

    let embeddings = EmbeddingClient::new(config.voyage_api_key.clone());
    let llm = LlmClient::new(backend.clone());

    let engine = Arc::new(MemoryEngine::new(vector, graph, embeddings, llm, backend.clone(), config.clone()));

    spawn_oauth_refresh(engine.clone(), config.clone(), backend);
    spawn_foresight_decay(engine.clone());

    let token = (!config.memory_token.is_empty()).then_some(config.memory_token.clone());
    let state = AppState::new(engine, token);
    let app = routes::build_router(state);

    let listener = match tokio::net::TcpListener::bind(cli.bind).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %cli.bind, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %cli.bind, "listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
        std::process::exit(1);
    }
}

/// Re-reads the OAuth credentials file every few minutes so a token rotated
/// by the host's Anthropic CLI login is picked up without a restart. The
/// engine's `LlmClient` is immutable once built, so this only logs rotation
/// today — rebuilding the client in place is future work.
fn spawn_oauth_refresh(_engine: Arc<MemoryEngine>, config: SidecarConfig, initial: DetectedBackend) {
    tokio::spawn(async move {
        let mut current = initial;
        loop {
            tokio::time::sleep(Duration::from_secs(300)).await;
            let refreshed = backend::refresh_oauth_token(current.clone(), &config).await;
            if refreshed.oauth_token != current.oauth_token {
                info!("oauth token rotation detected");
            }
            current = refreshed;
        }
    });
}

/// Decays past-expiry foresight signals on a fixed cadence, independent of
/// the attention daemon's own scoring loop.
fn spawn_foresight_decay(engine: Arc<MemoryEngine>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(900)).await;
            match engine.decay_foresight().await {
                Ok(touched) if touched > 0 => info!(touched, "foresight signals decayed"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "foresight decay failed"),
            }
        }
    });
}
