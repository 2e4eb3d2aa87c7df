//! Environment-driven configuration and the named thresholds from the spec.
//!
//! Every magic number called out in the design (dedup thresholds, recency
//! boost, graph-enhanced search weight, …) lives here as a named constant so
//! callers never inline a bare float.

use std::env;

/// Semantic-dedup threshold for `add`: neighbors scoring above this are
/// treated as the same memory and suppress the write.
pub const DEDUP_THRESHOLD: f32 = 0.85;

/// Exact-duplicate threshold for `add_direct`'s semantic check.
pub const DIRECT_DEDUP_THRESHOLD: f32 = 0.90;

/// `check_evolution`'s merge threshold.
pub const EVOLUTION_THRESHOLD: f32 = 0.80;

/// `consolidate`'s default duplicate threshold.
pub const CONSOLIDATE_DEFAULT_THRESHOLD: f32 = 0.90;

/// `retract`'s minimum match confidence before a memory is eligible for removal.
pub const RETRACTION_SCORE_THRESHOLD: f32 = 0.75;

/// Recency boost coefficient `b` in `b * (1 - age_hours/24)`.
pub const RECENCY_BOOST_B: f32 = 0.15;
pub const RECENCY_WINDOW_HOURS: f32 = 24.0;

/// Confidence-weighting caps from §4.5.
pub const CONFIDENCE_DECAY_PENALTY_CAP: f32 = 0.10;
pub const CONFIDENCE_DECAY_PENALTY_PER: f32 = 0.02;
pub const CONFIDENCE_ACCESS_BOOST_CAP: f32 = 0.05;
pub const CONFIDENCE_ACCESS_BOOST_PER: f32 = 0.01;
pub const CONFIDENCE_ACCESS_BOOST_MIN_COUNT: u64 = 2;

/// Default vector/graph result-merge weight for `graph_enhanced_search`.
/// Two variants exist in the source (0.3 and 0.5); the spec directs
/// implementers to default to 0.3 and leave it configurable.
pub const GRAPH_ENHANCED_DEFAULT_WEIGHT: f32 = 0.3;
pub const GRAPH_ENHANCED_MAX_NEIGHBOR_NAMES: usize = 5;
pub const GRAPH_ENHANCED_MAX_NEIGHBORS_PER_ENTITY: usize = 10;
pub const GRAPH_ENHANCED_MAX_ENTITIES: usize = 10;

/// `search_enhanced` query-rewrite bounds.
pub const SEARCH_ENHANCED_MIN_QUERY_LEN: usize = 10;
pub const SEARCH_ENHANCED_MAX_QUERY_LEN: usize = 500;
pub const SEARCH_ENHANCED_MAX_VARIANTS: usize = 4;
pub const SEARCH_ENHANCED_MAX_ALIAS_ENTITIES: usize = 5;

/// Link-generation bounds (§4 supplementary).
pub const LINK_SCORE_THRESHOLD: f32 = 0.6;
pub const LINK_MAX_NEIGHBORS: usize = 3;

/// `decay`'s defaults and bounds, mirroring the original's field constraints.
pub const DECAY_DEFAULT_DAYS_INACTIVE: i64 = 30;
pub const DECAY_MIN_DAYS_INACTIVE: i64 = 7;
pub const DECAY_MAX_DAYS_INACTIVE: i64 = 365;
pub const DECAY_DEFAULT_AMOUNT: f32 = 0.05;
pub const DECAY_MIN_AMOUNT: f32 = 0.01;
pub const DECAY_MAX_AMOUNT: f32 = 0.5;

/// Fire-and-forget post-commit work (link generation, episode recording)
/// runs off the request path but shares this bounded permit pool so a burst
/// of ingests can't spawn unbounded background tasks.
pub const POST_COMMIT_CONCURRENCY: usize = 4;

/// Analytics constants (§4.8).
pub const PAGERANK_ALPHA: f64 = 0.85;
pub const PAGERANK_MAX_ITER: usize = 100;
pub const LOUVAIN_SEED: u64 = 42;
pub const JACCARD_DEDUP_THRESHOLD: f64 = 0.8;
pub const JACCARD_MAX_NODES: usize = 200;
pub const DISCOVERY_SERENDIPITY_MIN: f64 = 0.1;
pub const DISCOVERY_HUB_TOP_N: usize = 10;

/// Graph availability cache TTL (§4.3).
pub const AVAILABILITY_CACHE_TTL_SECS: u64 = 30;

/// Timeouts (§5).
pub const LLM_TIMEOUT_SECS: u64 = 12;
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;
pub const ANALYTICS_TIMEOUT_SECS: u64 = 120;

/// Service configuration read once at sidecar startup.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    pub qdrant_host: String,
    pub qdrant_port: u16,
    pub neo4j_url: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub voyage_api_key: String,
    pub anthropic_api_key: String,
    pub ollama_url: String,
    pub memory_token: String,
    pub aletheia_home: Option<String>,
    pub link_generation_enabled: bool,
}

impl SidecarConfig {
    pub fn from_env() -> Self {
        Self {
            qdrant_host: env_or("QDRANT_HOST", "localhost"),
            qdrant_port: env::var("QDRANT_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6333),
            neo4j_url: env_or("NEO4J_URL", "neo4j://localhost:7687"),
            neo4j_user: env_or("NEO4J_USER", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "aletheia-memory"),
            voyage_api_key: env_or("VOYAGE_API_KEY", ""),
            anthropic_api_key: env_or("ANTHROPIC_API_KEY", ""),
            ollama_url: env_or("OLLAMA_URL", "http://localhost:11434"),
            memory_token: env_or("ALETHEIA_MEMORY_TOKEN", ""),
            aletheia_home: env::var("ALETHEIA_HOME").ok(),
            link_generation_enabled: env::var("LINK_GENERATION_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Relationship-extraction guidance handed to the fact-extraction LLM. Kept
/// here (not hardcoded into `backend.rs`) so prompt text and controlled
/// vocabulary stay defined next to each other.
pub fn graph_extraction_prompt(vocab: &[&str]) -> String {
    format!(
        "Use ONLY the following relationship types: {}. \
         Do NOT invent new relationship types outside this list. \
         Use RELATES_TO as fallback when no specific type fits.",
        vocab.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_env() {
        // SAFETY: test runs single-threaded within this process's test harness
        // and only touches keys this test owns.
        unsafe {
            env::remove_var("QDRANT_HOST");
            env::remove_var("QDRANT_PORT");
        }
        let cfg = SidecarConfig::from_env();
        assert_eq!(cfg.qdrant_host, "localhost");
        assert_eq!(cfg.qdrant_port, 6333);
    }
}
