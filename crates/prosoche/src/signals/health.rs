//! Health signal: process-manager service status, container runtime status,
//! and disk usage by mount point.

use async_trait::async_trait;
use tracing::warn;

use crate::config::ProsocheConfig;
use crate::signals::{Collector, Signal};

pub struct HealthCollector;

#[async_trait]
impl Collector for HealthCollector {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal> {
        let health_config = config.signal("health");
        if !health_config.enabled {
            return Vec::new();
        }

        let mut signals = Vec::new();

        for service in health_config.get_str_list("services") {
            let status = check_service(&service).await;
            if status != "active" {
                let urgency = if status == "failed" { 0.95 } else { 0.7 };
                signals.push(
                    Signal::new("health", format!("Service {service} is {status}"), urgency)
                        .with_nous(vec!["syn".into()])
                        .with_details(format!("systemctl status {service}: {status}")),
                );
            }
        }

        for container in health_config.get_str_list("docker_containers") {
            if !check_container(&container).await {
                signals.push(
                    Signal::new("health", format!("Container {container} is down"), 0.85)
                        .with_nous(vec!["syn".into()])
                        .with_details(format!("docker inspect {container}: not running or unhealthy")),
                );
            }
        }

        let disk_warn = health_config.get_u64("disk_warn_pct", 85);
        let disk_critical = health_config.get_u64("disk_critical_pct", 95);
        for (mount, pct) in check_disk().await {
            if pct >= disk_critical {
                signals.push(
                    Signal::new("health", format!("CRITICAL: {mount} at {pct}% disk usage"), 1.0)
                        .with_nous(vec!["syn".into()])
                        .with_details(format!("Disk {mount}: {pct}% used")),
                );
            } else if pct >= disk_warn {
                signals.push(
                    Signal::new("health", format!("Disk warning: {mount} at {pct}%"), 0.5)
                        .with_nous(vec!["syn".into()])
                        .with_details(format!("Disk {mount}: {pct}% used")),
                );
            }
        }

        signals
    }
}

async fn check_service(name: &str) -> String {
    match tokio::process::Command::new("systemctl").args(["is-active", name]).output().await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(e) => {
            warn!(service = name, error = %e, "service check failed");
            "unknown".to_string()
        }
    }
}

async fn check_container(name: &str) -> bool {
    let output = tokio::process::Command::new("docker")
        .args(["inspect", "-f", "{{.State.Running}}", name])
        .output()
        .await;
    match output {
        Ok(o) => String::from_utf8_lossy(&o.stdout).trim().eq_ignore_ascii_case("true"),
        Err(_) => false,
    }
}

const TRACKED_MOUNTS: &[&str] = &["/", "/mnt/ssd", "/mnt/nas"];

async fn check_disk() -> Vec<(String, u64)> {
    let output = tokio::process::Command::new("df")
        .args(["--output=target,pcent", "-x", "tmpfs", "-x", "devtmpfs"])
        .output()
        .await;
    let Ok(output) = output else {
        warn!("disk check failed to launch df");
        return Vec::new();
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let mount = parts.next()?.to_string();
            let pct: u64 = parts.next()?.trim_end_matches('%').parse().ok()?;
            TRACKED_MOUNTS.contains(&mount.as_str()).then_some((mount, pct))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_mounts_are_the_expected_set() {
        assert_eq!(TRACKED_MOUNTS, &["/", "/mnt/ssd", "/mnt/nas"]);
    }
}
