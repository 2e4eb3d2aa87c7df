//! Data model shared by ingestion, retrieval, temporal, evolution and analytics.
//!
//! Every type here is a plain, serde-derived record of something that lives in
//! the vector index, the property graph, or both. None of these types owns I/O;
//! they are passed into and returned from the gateway and engine modules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single durable assertion, identified by an opaque id and deduplicated by
/// `(user_id, content_hash)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPoint {
    pub id: Uuid,
    /// Display text, truncated to 500 chars at construction time.
    pub text_preview: String,
    pub full_text: String,
    /// Hex of the lowercased, trimmed full text.
    pub content_hash: String,
    pub user_id: String,
    /// `None` means the point is shared across all of the user's agents.
    pub agent_id: Option<String>,
    pub source: String,
    pub session_id: Option<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl MemoryPoint {
    pub const MAX_PREVIEW_CHARS: usize = 500;

    pub fn preview_of(text: &str) -> String {
        text.chars().take(Self::MAX_PREVIEW_CHARS).collect()
    }

    /// Hex digest of the lowercased, trimmed text. Used for the `add_direct`
    /// exact-duplicate check.
    pub fn content_hash(text: &str) -> String {
        use sha2::{Digest, Sha256};
        let normalized = text.trim().to_lowercase();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{digest:x}")
    }
}

/// A named node in the property graph, identity is the normalized name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub pagerank: Option<f64>,
    #[serde(default = "default_community")]
    pub community: i64,
}

fn default_community() -> i64 {
    -1
}

/// A directed edge between two entities, typed from the controlled vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub rel_type: String,
    pub confidence: f32,
    pub source_provenance: String,
    pub created_at: DateTime<Utc>,
}

/// A bi-temporal directed edge `TEMPORAL_FACT {predicate}` between two entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalFact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub valid_from: DateTime<Utc>,
    /// `None` means this fact is currently open (still valid).
    pub valid_to: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub confidence: f32,
    pub source_episode_id: Option<String>,
    pub invalidation_reason: Option<String>,
}

impl TemporalFact {
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// A recorded interaction, linked by `MENTIONS` edges to extracted entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub content_preview: String,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub source: String,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

impl Episode {
    /// `ep_<hex12>` — twelve lowercase hex characters from a v4 UUID.
    pub fn new_id() -> String {
        let raw = Uuid::new_v4().simple().to_string();
        format!("ep_{}", &raw[..12])
    }
}

/// Per-memory access telemetry, keyed by memory id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MemoryAccess {
    pub memory_id: String,
    pub access_count: u64,
    pub first_accessed: Option<DateTime<Utc>>,
    pub last_accessed: Option<DateTime<Utc>>,
    pub decay_count: u64,
    pub last_decayed: Option<DateTime<Utc>>,
}

/// A weighted anticipatory note attached to an entity by `HAS_FORESIGHT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForesightSignal {
    pub entity: String,
    pub signal: String,
    pub activation: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
    pub weight: f64,
}

impl ForesightSignal {
    pub const DECAY_STEP: f64 = 0.1;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|e| e <= now)
    }
}

/// A precomputed cross-community bridge or high-betweenness hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryCandidate {
    pub entity_a: String,
    pub entity_b: String,
    pub candidate_type: DiscoveryCandidateType,
    pub bridge_score: f64,
    pub community_a: i64,
    pub community_b: i64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryCandidateType {
    CrossCommunityBridge,
    HighBetweennessHub,
}

impl std::fmt::Display for DiscoveryCandidateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CrossCommunityBridge => "cross_community_bridge",
            Self::HighBetweennessHub => "high_betweenness_hub",
        };
        f.write_str(s)
    }
}

/// Runtime-only attention signal, produced by the daemon's collectors and
/// consumed by its scorer. Kept here so the sidecar's `/foresight/*` and
/// memory-state collector share one wire shape with `prosoche`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionSignal {
    pub source: String,
    pub summary: String,
    pub urgency: f64,
    #[serde(default)]
    pub relevant_nous: Vec<String>,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub context_blocks: Vec<ContextBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    pub title: String,
    pub content: String,
    pub source: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_case_and_whitespace_insensitive() {
        let a = MemoryPoint::content_hash("  User Drives a 2024 4Runner ");
        let b = MemoryPoint::content_hash("user drives a 2024 4runner");
        assert_eq!(a, b);
    }

    #[test]
    fn content_hash_differs_for_different_text() {
        let a = MemoryPoint::content_hash("a");
        let b = MemoryPoint::content_hash("b");
        assert_ne!(a, b);
    }

    #[test]
    fn episode_id_has_expected_shape() {
        let id = Episode::new_id();
        assert!(id.starts_with("ep_"));
        assert_eq!(id.len(), "ep_".len() + 12);
    }

    #[test]
    fn foresight_expiry() {
        let now = Utc::now();
        let expired = ForesightSignal {
            entity: "x".into(),
            signal: "s".into(),
            activation: now,
            expiry: Some(now - chrono::Duration::seconds(1)),
            weight: 1.0,
        };
        assert!(expired.is_expired(now));
        let open = ForesightSignal { expiry: None, ..expired };
        assert!(!open.is_expired(now));
    }
}
