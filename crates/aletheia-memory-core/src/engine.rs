//! Wires the storage gateways, embedding/LLM clients, and detected backend
//! into the single handle the ingestion/retrieval/temporal/evolution/
//! analytics modules all hang their `impl` blocks off of.

use std::sync::Arc;

use tokio::sync::{RwLock, Semaphore};

use crate::backend::DetectedBackend;
use crate::config::{SidecarConfig, POST_COMMIT_CONCURRENCY};
use crate::embedding::EmbeddingClient;
use crate::entity::AliasMap;
use crate::llm::LlmClient;
use crate::error::Result;
use crate::model::DiscoveryCandidate;
use crate::storage::{GraphGateway, GraphStats, VectorGateway};

pub struct MemoryEngine {
    pub(crate) vector: Arc<dyn VectorGateway>,
    pub(crate) graph: Arc<dyn GraphGateway>,
    pub(crate) embeddings: EmbeddingClient,
    pub(crate) llm: LlmClient,
    pub(crate) backend: DetectedBackend,
    pub(crate) aliases: AliasMap,
    pub(crate) config: SidecarConfig,
    /// Last `generate_discovery_candidates` run — replaced wholesale, no
    /// retention window.
    pub(crate) discovery_cache: RwLock<Vec<DiscoveryCandidate>>,
    /// Bounds fire-and-forget post-commit work (`spawn_post_commit`) so a
    /// burst of ingests can't spawn unbounded background tasks.
    pub(crate) post_commit: Arc<Semaphore>,
}

impl MemoryEngine {
    pub fn new(
        vector: Arc<dyn VectorGateway>,
        graph: Arc<dyn GraphGateway>,
        embeddings: EmbeddingClient,
        llm: LlmClient,
        backend: DetectedBackend,
        config: SidecarConfig,
    ) -> Self {
        Self {
            vector,
            graph,
            embeddings,
            llm,
            backend,
            aliases: AliasMap::new(),
            config,
            discovery_cache: RwLock::new(Vec::new()),
            post_commit: Arc::new(Semaphore::new(POST_COMMIT_CONCURRENCY)),
        }
    }

    pub fn with_aliases(mut self, aliases: AliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn backend(&self) -> &DetectedBackend {
        &self.backend
    }

    pub fn config(&self) -> &SidecarConfig {
        &self.config
    }

    pub async fn graph_available(&self) -> bool {
        self.graph.is_available().await
    }

    pub async fn vector_available(&self) -> bool {
        self.vector.is_available().await
    }

    /// Coarse node/edge counts backing `/graph_stats`, `/temporal/stats`,
    /// `/evolution/stats` and `/evolution/fact_stats`.
    pub async fn graph_stats(&self) -> Result<GraphStats> {
        self.graph.graph_stats().await
    }
}
