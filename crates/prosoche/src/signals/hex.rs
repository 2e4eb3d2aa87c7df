//! Hex signal: dashboard-project run freshness and failure detection via the
//! Hex API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, Signal};

const HEX_API_BASE: &str = "https://hc.hex.tech/api/v1";

pub struct HexCollector {
    client: reqwest::Client,
}

impl HexCollector {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Collector for HexCollector {
    fn name(&self) -> &'static str {
        "hex"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let hex_config = config.signal("hex");
        if !hex_config.enabled {
            return Vec::new();
        }

        let Ok(token) = std::env::var("HEX_API_TOKEN") else {
            warn!("HEX_API_TOKEN not set, skipping hex signal collection");
            return Vec::new();
        };

        let projects = hex_config.get_str_list("projects");
        let stale_hours = hex_config.get_f64("stale_hours", 26.0);
        let failure_urgency = hex_config.get_f64("failure_urgency", 0.9);
        let stale_urgency = hex_config.get_f64("stale_urgency", 0.6);

        let mut signals = Vec::new();
        for project_id in &projects {
            match fetch_latest_run(&self.client, &token, project_id).await {
                Ok(None) => {
                    signals.push(
                        Signal::new("hex", format!("No runs found for project {}...", &project_id[..8.min(project_id.len())]), stale_urgency)
                            .with_nous(vec!["chiron".into()])
                            .with_details(format!("project_id={project_id}")),
                    );
                }
                Ok(Some(run)) => {
                    let short = &project_id[..8.min(project_id.len())];
                    if matches!(run.status.as_str(), "ERRORED" | "error" | "FAILED") {
                        signals.push(
                            Signal::new("hex", format!("Hex project {short}... run failed ({})", run.status), failure_urgency)
                                .with_nous(vec!["chiron".into()])
                                .with_details(format!(
                                    "project_id={project_id} run_id={} status={}",
                                    run.run_id(),
                                    run.status
                                )),
                        );
                        continue;
                    }

                    if let Some(ended_at) = run.ended_at() {
                        let hours_ago = (Utc::now() - ended_at).num_minutes() as f64 / 60.0;
                        if hours_ago > stale_hours {
                            signals.push(
                                Signal::new(
                                    "hex",
                                    format!("Hex project {short}... stale ({hours_ago:.0}h since last run)"),
                                    stale_urgency,
                                )
                                .with_nous(vec!["chiron".into()])
                                .with_details(format!(
                                    "project_id={project_id} last_run={ended_at} hours_ago={hours_ago:.1}"
                                )),
                            );
                        }
                    }
                }
                Err(e) => warn!(project_id, error = %e, "hex signal failed"),
            }
        }

        signals
    }
}

#[derive(Debug, Deserialize)]
struct HexRun {
    #[serde(default)]
    status: String,
    #[serde(rename = "runId", default)]
    run_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "endTime", default)]
    end_time: Option<String>,
    #[serde(rename = "endedAt", default)]
    ended_at_field: Option<String>,
}

impl HexRun {
    fn run_id(&self) -> &str {
        self.run_id.as_deref().or(self.id.as_deref()).unwrap_or("?")
    }

    fn ended_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.end_time.as_deref().or(self.ended_at_field.as_deref())?;
        let normalized = raw.strip_suffix('Z').map(|s| format!("{s}+00:00")).unwrap_or_else(|| raw.to_string());
        normalized.parse().ok()
    }
}

async fn fetch_latest_run(client: &reqwest::Client, token: &str, project_id: &str) -> anyhow::Result<Option<HexRun>> {
    let resp = client
        .get(format!("{HEX_API_BASE}/project/{project_id}/runs"))
        .bearer_auth(token)
        .query(&[("limit", "1")])
        .timeout(std::time::Duration::from_secs(15))
        .send()
        .await?;
    if !resp.status().is_success() {
        anyhow::bail!("hex API returned {}", resp.status());
    }
    let runs: Vec<HexRun> = resp.json().await?;
    Ok(runs.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_falls_back_to_id_field() {
        let run = HexRun { status: "SUCCEEDED".into(), run_id: None, id: Some("abc".into()), end_time: None, ended_at_field: None };
        assert_eq!(run.run_id(), "abc");
    }

    #[test]
    fn ended_at_parses_z_suffix() {
        let run = HexRun {
            status: "SUCCEEDED".into(),
            run_id: None,
            id: None,
            end_time: Some("2026-07-20T10:00:00Z".into()),
            ended_at_field: None,
        };
        assert!(run.ended_at().is_some());
    }
}
