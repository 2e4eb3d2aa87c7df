//! Redshift signal: cluster health via the AWS Data API CLI (failed and
//! long-running queries).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, Signal};

pub struct RedshiftCollector;

#[async_trait]
impl Collector for RedshiftCollector {
    fn name(&self) -> &'static str {
        "redshift"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let rs_config = config.signal("redshift");
        if !rs_config.enabled {
            return Vec::new();
        }

        let cluster = rs_config.get_str("cluster", "");
        if cluster.is_empty() {
            warn!("redshift cluster not configured, skipping signal collection");
            return Vec::new();
        }

        let failed_urgency = rs_config.get_f64("failed_query_urgency", 0.9);
        let long_running_seconds = rs_config.get_f64("long_running_seconds", 300.0);
        let long_running_urgency = rs_config.get_f64("long_running_urgency", 0.7);

        let mut signals = Vec::new();

        for stmt in list_statements(&cluster, "FAILED", Some(5)).await {
            let preview = preview(&stmt.query_string);
            signals.push(
                Signal::new("redshift", format!("Redshift query failed: {}", truncate(&preview, 60)), failed_urgency)
                    .with_nous(vec!["chiron".into()])
                    .with_details(format!("statement_id={} updated={} sql={preview}", stmt.id, stmt.updated_at)),
            );
        }

        let now = Utc::now();
        for stmt in list_statements(&cluster, "STARTED", None).await {
            let Some(created) = parse_ts(&stmt.created_at) else { continue };
            let duration = (now - created).num_seconds() as f64;
            if duration > long_running_seconds {
                let preview = preview(&stmt.query_string);
                let minutes = duration / 60.0;
                signals.push(
                    Signal::new(
                        "redshift",
                        format!("Redshift query running {minutes:.0}min: {}", truncate(&preview, 50)),
                        long_running_urgency,
                    )
                    .with_nous(vec!["chiron".into()])
                    .with_details(format!("statement_id={} duration={minutes:.1}min sql={preview}", stmt.id)),
                );
            }
        }

        signals
    }
}

#[derive(Debug, Deserialize)]
struct Statement {
    #[serde(rename = "Id", default)]
    id: String,
    #[serde(rename = "QueryString", default)]
    query_string: String,
    #[serde(rename = "UpdatedAt", default)]
    updated_at: String,
    #[serde(rename = "CreatedAt", default)]
    created_at: String,
}

#[derive(Debug, Deserialize)]
struct ListStatementsResponse {
    #[serde(rename = "Statements", default)]
    statements: Vec<Statement>,
}

async fn list_statements(cluster: &str, status: &str, limit: Option<usize>) -> Vec<Statement> {
    let mut args =
        vec!["redshift-data", "list-statements", "--cluster-identifier", cluster, "--status", status];
    let limit_str;
    if let Some(limit) = limit {
        limit_str = limit.to_string();
        args.push("--max-results");
        args.push(&limit_str);
    }

    match tokio::process::Command::new("aws").args(&args).output().await {
        Ok(output) if output.status.success() => {
            serde_json::from_slice::<ListStatementsResponse>(&output.stdout).map(|r| r.statements).unwrap_or_default()
        }
        Ok(output) => {
            warn!(status, stderr = %String::from_utf8_lossy(&output.stderr), "aws cli failed");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "aws cli not found, skipping redshift signal collection");
            Vec::new()
        }
    }
}

fn preview(query: &str) -> String {
    if query.len() > 120 { format!("{}...", &query[..120]) } else { query.to_string() }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max { s[..max].to_string() } else { s.to_string() }
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    let normalized = raw.strip_suffix('Z').map(|s| format!("{s}+00:00")).unwrap_or_else(|| raw.to_string());
    normalized.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_queries() {
        let long = "a".repeat(200);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.len(), 123);
    }

    #[test]
    fn preview_leaves_short_queries_untouched() {
        assert_eq!(preview("select 1"), "select 1");
    }
}
