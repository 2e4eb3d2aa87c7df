//! Memory-state signal: polls the memory sidecar's health and anticipatory
//! foresight signals, and surfaces cross-community discovery bridges as
//! staged context.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use async_trait::async_trait;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, ContextBlock, Signal};

pub struct MemoryCollector {
    client: reqwest::Client,
}

impl MemoryCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let mem_config = config.signal("memory");
        if !mem_config.enabled {
            return Vec::new();
        }
        let sidecar_url = mem_config.get_str("sidecar_url", "http://127.0.0.1:8420");

        let mut signals = Vec::new();

        match self.client.get(format!("{sidecar_url}/health")).send().await {
            Ok(resp) if !resp.status().is_success() => {
                signals.push(
                    Signal::new("memory", "Mem0 sidecar unhealthy", 0.6)
                        .with_nous(vec!["syn".into()])
                        .with_details(format!("Health check returned {}", resp.status())),
                );
            }
            Ok(_) => {}
            Err(e) => {
                signals.push(
                    Signal::new("memory", format!("Mem0 sidecar unreachable: {e}"), 0.5)
                        .with_nous(vec!["syn".into()]),
                );
                return signals;
            }
        }

        match self.client.get(format!("{sidecar_url}/foresight/active")).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<ForesightResponse>().await {
                Ok(data) => signals.extend(data.signals.into_iter().map(foresight_to_signal)),
                Err(e) => debug!(error = %e, "foresight response parse failed"),
            },
            Ok(resp) => debug!(status = %resp.status(), "foresight query non-success"),
            Err(e) => debug!(error = %e, "foresight query failed (non-critical)"),
        }

        match self.client.get(format!("{sidecar_url}/discovery/candidates")).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<CandidatesResponse>().await {
                Ok(data) => {
                    if let Some(signal) = bridge_signal(data.candidates) {
                        signals.push(signal);
                    }
                }
                Err(e) => debug!(error = %e, "discovery candidates parse failed"),
            },
            Ok(resp) => debug!(status = %resp.status(), "discovery candidates query non-success"),
            Err(e) => debug!(error = %e, "discovery candidates query failed (non-critical)"),
        }

        // /evolution/stats is polled for operator visibility only; no
        // threshold in the design maps its counters to a signal yet.
        if let Err(e) = self.client.get(format!("{sidecar_url}/evolution/stats")).send().await {
            debug!(error = %e, "evolution stats query failed (non-critical)");
        }

        signals
    }
}

#[derive(Debug, Deserialize)]
struct CandidatesResponse {
    #[serde(default)]
    candidates: Vec<CandidateEntry>,
}

#[derive(Debug, Deserialize)]
struct CandidateEntry {
    entity_a: String,
    entity_b: String,
    candidate_type: String,
    bridge_score: f64,
}

/// Bundles every cross-community bridge candidate into one informational
/// signal carrying one context block per bridge, each expiring in 12h.
fn bridge_signal(candidates: Vec<CandidateEntry>) -> Option<Signal> {
    let bridges: Vec<CandidateEntry> =
        candidates.into_iter().filter(|c| c.candidate_type == "cross_community_bridge").collect();
    if bridges.is_empty() {
        return None;
    }

    let expires_at = Some(Utc::now() + Duration::hours(12));
    let blocks: Vec<ContextBlock> = bridges
        .iter()
        .map(|b| ContextBlock {
            title: format!("Bridge: {} ↔ {}", b.entity_a, b.entity_b),
            content: format!("Cross-community bridge, score {:.2}", b.bridge_score),
            source: "memory".to_string(),
            expires_at,
        })
        .collect();

    Some(
        Signal::new("memory", format!("{} cross-community bridges discovered", bridges.len()), 0.2)
            .with_context(blocks),
    )
}

#[derive(Debug, Deserialize)]
struct ForesightResponse {
    #[serde(default)]
    signals: Vec<ForesightEntry>,
}

#[derive(Debug, Deserialize)]
struct ForesightEntry {
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    signal: Option<String>,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    expiry: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

fn foresight_to_signal(entry: ForesightEntry) -> Signal {
    let entity = entry.entity.unwrap_or_else(|| "unknown".to_string());
    let signal_text = entry.signal.unwrap_or_default();
    let urgency = (0.3 + entry.weight * 0.1).min(0.9);

    let expires_at = entry
        .expiry
        .and_then(|e| {
            let normalized = e.strip_suffix('Z').map(|s| format!("{s}+00:00")).unwrap_or(e);
            normalized.parse::<DateTime<Utc>>().ok()
        })
        .unwrap_or_else(|| Utc::now() + Duration::hours(24));

    Signal::new("memory", format!("Foresight: {entity} — {signal_text}"), urgency)
        .with_details(format!("Weight: {}, entity: {entity}", entry.weight))
        .with_context(vec![ContextBlock {
            title: format!("Foresight: {entity}"),
            content: signal_text,
            source: "foresight".to_string(),
            expires_at: Some(expires_at),
        }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_maps_to_bounded_urgency() {
        let entry =
            ForesightEntry { entity: Some("Acme".into()), signal: Some("renewal".into()), weight: 10.0, expiry: None };
        let signal = foresight_to_signal(entry);
        assert!((signal.urgency - 0.9).abs() < 1e-9);
        assert!(signal.relevant_nous.is_empty());
    }

    #[test]
    fn bridge_signal_filters_non_bridge_candidates() {
        let candidates = vec![
            CandidateEntry {
                entity_a: "Rust".into(),
                entity_b: "Neuroscience".into(),
                candidate_type: "cross_community_bridge".into(),
                bridge_score: 0.4,
            },
            CandidateEntry {
                entity_a: "Hub".into(),
                entity_b: "Node".into(),
                candidate_type: "high_betweenness_hub".into(),
                bridge_score: 0.9,
            },
        ];
        let signal = bridge_signal(candidates).unwrap();
        assert_eq!(signal.context_blocks.len(), 1);
        assert!(signal.context_blocks[0].title.contains("Rust"));
    }

    #[test]
    fn no_bridges_yields_no_signal() {
        assert!(bridge_signal(Vec::new()).is_none());
    }

    #[test]
    fn missing_expiry_defaults_to_24h() {
        let entry = ForesightEntry { entity: Some("Bob".into()), signal: Some("s".into()), weight: 1.0, expiry: None };
        let signal = foresight_to_signal(entry);
        let expiry = signal.context_blocks[0].expires_at.unwrap();
        let delta = expiry - Utc::now();
        assert!(delta.num_hours() >= 23);
    }
}
