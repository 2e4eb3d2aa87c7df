//! Wake budget: rate limits plus fingerprint-based duplicate suppression,
//! and the outbound POST that actually wakes an agent through the gateway.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use md5::{Digest, Md5};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{GatewayConfig, DEDUP_WINDOW_SECS};
use crate::scoring::NousScore;

pub struct WakeBudget {
    max_per_nous: u32,
    max_total: u32,
    cooldown: Duration,
    nous_wakes: HashMap<String, Vec<Instant>>,
    total_wakes: Vec<Instant>,
    last_wake: HashMap<String, Instant>,
    fingerprints: HashMap<String, Vec<(String, Instant)>>,
}

impl WakeBudget {
    pub fn new(max_per_nous_per_hour: u32, max_total_per_hour: u32, cooldown_seconds: u64) -> Self {
        Self {
            max_per_nous: max_per_nous_per_hour,
            max_total: max_total_per_hour,
            cooldown: Duration::from_secs(cooldown_seconds),
            nous_wakes: HashMap::new(),
            total_wakes: Vec::new(),
            last_wake: HashMap::new(),
            fingerprints: HashMap::new(),
        }
    }

    pub fn can_wake(&mut self, nous_id: &str) -> bool {
        let now = Instant::now();
        let hour_ago = Duration::from_secs(3600);

        self.total_wakes.retain(|t| now.duration_since(*t) < hour_ago);
        if self.total_wakes.len() as u32 >= self.max_total {
            return false;
        }

        let nous = self.nous_wakes.entry(nous_id.to_string()).or_default();
        nous.retain(|t| now.duration_since(*t) < hour_ago);
        if nous.len() as u32 >= self.max_per_nous {
            return false;
        }

        if let Some(last) = self.last_wake.get(nous_id) {
            if now.duration_since(*last) < self.cooldown {
                return false;
            }
        }

        true
    }

    /// MD5 over the sorted, joined signal summaries — a cheap content
    /// fingerprint, not a security hash.
    pub fn fingerprint(summaries: &[&str]) -> String {
        let mut sorted: Vec<&str> = summaries.to_vec();
        sorted.sort_unstable();
        let joined = sorted.join("\n");
        let digest = Md5::digest(joined.as_bytes());
        format!("{digest:x}")
    }

    pub fn is_duplicate(&self, nous_id: &str, fingerprint: &str) -> bool {
        let window = Duration::from_secs(DEDUP_WINDOW_SECS);
        let now = Instant::now();
        self.fingerprints
            .get(nous_id)
            .map(|entries| {
                entries
                    .iter()
                    .any(|(fp, at)| fp == fingerprint && now.duration_since(*at) < window)
            })
            .unwrap_or(false)
    }

    pub fn record_wake(&mut self, nous_id: &str, fingerprint: &str) {
        let now = Instant::now();
        self.nous_wakes.entry(nous_id.to_string()).or_default().push(now);
        self.total_wakes.push(now);
        self.last_wake.insert(nous_id.to_string(), now);

        let window = Duration::from_secs(DEDUP_WINDOW_SECS);
        let entries = self.fingerprints.entry(nous_id.to_string()).or_default();
        entries.retain(|(_, at)| now.duration_since(*at) < window);
        entries.push((fingerprint.to_string(), now));
    }
}

#[derive(Debug, Serialize)]
struct WakeRequest {
    #[serde(rename = "agentId")]
    agent_id: String,
    message: String,
    #[serde(rename = "sessionKey")]
    session_key: &'static str,
}

/// Legacy agent-id aliasing: the gateway still calls the primary agent `main`.
fn gateway_agent_id(nous_id: &str) -> String {
    if nous_id == "syn" { "main".to_string() } else { nous_id.to_string() }
}

/// POSTs a wake event to the gateway for the top-3 urgent signals in `score`.
/// Returns `true` only on a successful (2xx) response.
pub async fn trigger_wake(client: &reqwest::Client, score: &NousScore, gateway: &GatewayConfig) -> bool {
    let urgent_items: Vec<&crate::signals::Signal> =
        score.top_signals.iter().filter(|s| s.urgency >= 0.8).collect();
    if urgent_items.is_empty() {
        return false;
    }

    let mut lines = vec![format!("Attention needed for {}:", score.nous_id)];
    for signal in urgent_items.iter().take(3) {
        lines.push(format!("- {}", signal.summary));
    }
    let message = lines.join("\n");

    let req = WakeRequest { agent_id: gateway_agent_id(&score.nous_id), message, session_key: "prosoche" };

    let url = format!("{}/api/sessions/send", gateway.url.trim_end_matches('/'));
    let result = client.post(&url).bearer_auth(&gateway.token).json(&req).send().await;

    match result {
        Ok(resp) if resp.status().is_success() => {
            info!(nous_id = %score.nous_id, summary = %urgent_items[0].summary, "wake triggered");
            true
        }
        Ok(resp) => {
            warn!(nous_id = %score.nous_id, status = %resp.status(), "wake rejected by gateway");
            false
        }
        Err(e) => {
            warn!(nous_id = %score.nous_id, error = %e, "wake trigger failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforces_per_nous_limit() {
        let mut budget = WakeBudget::new(2, 6, 0);
        assert!(budget.can_wake("syn"));
        budget.record_wake("syn", "fp1");
        assert!(budget.can_wake("syn"));
        budget.record_wake("syn", "fp2");
        assert!(!budget.can_wake("syn"));
    }

    #[test]
    fn enforces_global_limit_across_agents() {
        let mut budget = WakeBudget::new(10, 2, 0);
        budget.record_wake("syn", "a");
        budget.record_wake("arbor", "b");
        assert!(!budget.can_wake("syl"));
    }

    #[test]
    fn enforces_cooldown() {
        let mut budget = WakeBudget::new(10, 10, 3600);
        budget.record_wake("syn", "a");
        assert!(!budget.can_wake("syn"));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = WakeBudget::fingerprint(&["b signal", "a signal"]);
        let b = WakeBudget::fingerprint(&["a signal", "b signal"]);
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_fingerprint_suppressed_within_window() {
        let mut budget = WakeBudget::new(10, 10, 0);
        budget.record_wake("syn", "fp");
        assert!(budget.is_duplicate("syn", "fp"));
        assert!(!budget.is_duplicate("syn", "other"));
    }

    #[test]
    fn legacy_agent_alias() {
        assert_eq!(gateway_agent_id("syn"), "main");
        assert_eq!(gateway_agent_id("arbor"), "arbor");
    }
}
