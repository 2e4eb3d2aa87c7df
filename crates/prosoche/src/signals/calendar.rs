//! Calendar signal: upcoming events via an external calendar CLI, scored by
//! proximity to the event start.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, Signal};

const GCAL_BIN: &str = "/usr/local/bin/gcal";

pub struct CalendarCollector;

#[async_trait]
impl Collector for CalendarCollector {
    fn name(&self) -> &'static str {
        "calendar"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let cal_config = config.signal("calendar");
        if !cal_config.enabled {
            return Vec::new();
        }

        let look_ahead = cal_config.get_u64("look_ahead_minutes", 120) as i64;
        let urgent_minutes = cal_config.get_u64("urgent_minutes", 30) as i64;
        let calendar_ids = cal_config.get_str_map("calendar_ids");

        let mut signals = Vec::new();
        for (cal_name, cal_id) in &calendar_ids {
            match fetch_events(&cal_id.clone()).await {
                Ok(events) => {
                    for event in events {
                        let Some(minutes_until) = minutes_until(&event.start) else { continue };
                        if minutes_until < -15 || minutes_until > look_ahead {
                            continue;
                        }

                        let (urgency, summary) = if minutes_until <= urgent_minutes {
                            let urgency =
                                (0.7 + (urgent_minutes - minutes_until) as f64 / urgent_minutes as f64 * 0.3).min(1.0);
                            (urgency, format!("URGENT: {} in {minutes_until}min", event.title))
                        } else {
                            let urgency = 0.3 + (look_ahead - minutes_until) as f64 / look_ahead as f64 * 0.3;
                            (urgency, format!("{} in {minutes_until}min", event.title))
                        };

                        signals.push(
                            Signal::new("calendar", summary, urgency)
                                .with_nous(map_calendar_to_nous(cal_name))
                                .with_details(format!("{cal_name}: {} at {}", event.title, event.start)),
                        );
                    }
                }
                Err(e) => warn!(calendar = %cal_name, error = %e, "calendar signal failed"),
            }
        }

        signals
    }
}

struct RawEvent {
    title: String,
    start: String,
}

async fn fetch_events(calendar_id: &str) -> anyhow::Result<Vec<RawEvent>> {
    let output = tokio::process::Command::new(GCAL_BIN)
        .args(["events", "-c", calendar_id, "-d", "1"])
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!("gcal exited with {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if let Ok(parsed) = serde_json::from_str::<Vec<serde_json::Value>>(&stdout) {
        return Ok(parsed
            .into_iter()
            .map(|v| RawEvent {
                title: v.get("title").and_then(|t| t.as_str()).unwrap_or_default().to_string(),
                start: v.get("start").and_then(|t| t.as_str()).unwrap_or_default().to_string(),
            })
            .collect());
    }

    Ok(stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.splitn(2, '|');
            let title = parts.next()?.trim().to_string();
            let start = parts.next()?.trim().to_string();
            Some(RawEvent { title, start })
        })
        .collect())
}

fn minutes_until(start: &str) -> Option<i64> {
    if start.is_empty() {
        return None;
    }
    let dt: DateTime<Utc> = if let Some(stripped) = start.strip_suffix('Z') {
        format!("{stripped}+00:00").parse().ok()?
    } else {
        start.parse().ok()?
    };
    Some((dt - Utc::now()).num_minutes())
}

fn map_calendar_to_nous(cal_name: &str) -> Vec<String> {
    match cal_name {
        "work" => vec!["arbor".into(), "syn".into()],
        "family" => vec!["syl".into(), "syn".into()],
        "personal" => vec!["syn".into(), "syl".into()],
        _ => vec!["syn".into()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_ramp_saturates_at_one() {
        assert!((0.7 + (30 - 0) as f64 / 30.0 * 0.3 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_calendar_defaults_to_syn() {
        assert_eq!(map_calendar_to_nous("unknown"), vec!["syn".to_string()]);
    }

    #[test]
    fn minutes_until_handles_z_suffix() {
        let future = (Utc::now() + chrono::Duration::minutes(45)).to_rfc3339();
        let as_z = future.replace("+00:00", "Z");
        let minutes = minutes_until(&as_z).unwrap();
        assert!((40..=45).contains(&minutes));
    }
}
