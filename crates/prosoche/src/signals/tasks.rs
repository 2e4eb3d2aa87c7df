//! Task signal: pending and overdue items from an external task CLI,
//! routed to agents via a configured project→agent map.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, Signal};

pub struct TasksCollector;

#[async_trait]
impl Collector for TasksCollector {
    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let task_config = config.signal("tasks");
        if !task_config.enabled {
            return Vec::new();
        }

        let overdue_urgency = task_config.get_f64("overdue_urgency", 0.9);
        let due_today_urgency = task_config.get_f64("due_today_urgency", 0.6);
        let project_nous = task_config.get_str_map("project_nous");

        let mut signals = Vec::new();

        let overdue = query_tasks(&["status:pending", "+OVERDUE"]).await;
        let mut seen_descriptions = Vec::new();
        for task in overdue {
            let nous_id = resolve_nous(&task, &project_nous);
            seen_descriptions.push(task.description.clone());
            signals.push(
                Signal::new("tasks", format!("OVERDUE: {}", task.description), overdue_urgency)
                    .with_nous(routed_nous(&nous_id))
                    .with_details(format!("project:{} priority:{}", task.project(), task.priority())),
            );
        }

        let due_today = query_tasks(&["status:pending", "due:today"]).await;
        for task in due_today {
            if seen_descriptions.contains(&task.description) {
                continue;
            }
            let nous_id = resolve_nous(&task, &project_nous);
            signals.push(
                Signal::new("tasks", format!("Due today: {}", task.description), due_today_urgency)
                    .with_nous(routed_nous(&nous_id))
                    .with_details(format!("project:{} priority:{}", task.project(), task.priority())),
            );
        }

        let high_priority = query_tasks(&["status:pending", "priority:H", "-OVERDUE", "due.not:today"]).await;
        for task in high_priority.into_iter().take(5) {
            let nous_id = resolve_nous(&task, &project_nous);
            signals.push(
                Signal::new("tasks", format!("High priority: {}", task.description), 0.4)
                    .with_nous(vec![nous_id])
                    .with_details(format!("project:{}", task.project())),
            );
        }

        signals
    }
}

#[derive(Debug, Deserialize)]
struct RawTask {
    description: String,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

impl RawTask {
    fn project(&self) -> &str {
        self.project.as_deref().unwrap_or("?")
    }
    fn priority(&self) -> &str {
        self.priority.as_deref().unwrap_or("?")
    }
}

async fn query_tasks(filters: &[&str]) -> Vec<RawTask> {
    let mut args: Vec<&str> = filters.to_vec();
    args.push("export");
    match tokio::process::Command::new("task").args(&args).output().await {
        Ok(output) if output.status.success() => {
            serde_json::from_slice(&output.stdout).unwrap_or_default()
        }
        Ok(output) => {
            warn!(status = %output.status, "taskwarrior query failed");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "taskwarrior not available");
            Vec::new()
        }
    }
}

fn resolve_nous(task: &RawTask, project_nous: &std::collections::HashMap<String, String>) -> String {
    let project = task.project();
    if let Some(n) = project_nous.get(project) {
        return n.clone();
    }
    for (prefix, nous_id) in project_nous {
        if project.starts_with(prefix.as_str()) {
            return nous_id.clone();
        }
    }
    "syn".to_string()
}

fn routed_nous(nous_id: &str) -> Vec<String> {
    if nous_id == "syn" { vec!["syn".into()] } else { vec![nous_id.to_string(), "syn".into()] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn resolve_nous_matches_exact_project() {
        let mut map = HashMap::new();
        map.insert("backend".to_string(), "arbor".to_string());
        let task = RawTask { description: "x".into(), project: Some("backend".into()), priority: None };
        assert_eq!(resolve_nous(&task, &map), "arbor");
    }

    #[test]
    fn resolve_nous_matches_prefix() {
        let mut map = HashMap::new();
        map.insert("backend.".to_string(), "arbor".to_string());
        let task = RawTask { description: "x".into(), project: Some("backend.api".into()), priority: None };
        assert_eq!(resolve_nous(&task, &map), "arbor");
    }

    #[test]
    fn resolve_nous_falls_back_to_syn() {
        let task = RawTask { description: "x".into(), project: None, priority: None };
        assert_eq!(resolve_nous(&task, &HashMap::new()), "syn");
    }

    #[test]
    fn routed_nous_always_includes_syn() {
        assert_eq!(routed_nous("arbor"), vec!["arbor".to_string(), "syn".to_string()]);
        assert_eq!(routed_nous("syn"), vec!["syn".to_string()]);
    }
}
