//! The attention daemon's main loop: collect, score, stage, and wake.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Timelike, Utc};
use tracing::{debug, error, info, warn};

use crate::config::ProsocheConfig;
use crate::prediction::{predictive_signals, ActivityModel};
use crate::rhythm::rhythm_signals;
use crate::scoring::score_nous;
use crate::signals::{Collector, Signal, SignalBundle};
use crate::wake::{trigger_wake, WakeBudget};
use crate::writer::update_prosoche;

pub struct ProsocheDaemon {
    config: ProsocheConfig,
    collectors: Vec<Box<dyn Collector>>,
    http: reqwest::Client,
    bundle: SignalBundle,
    last_collection: HashMap<&'static str, Instant>,
    budget: WakeBudget,
    activity_model: ActivityModel,
    last_activity_day: HashMap<String, chrono::NaiveDate>,
    running: Arc<AtomicBool>,
}

impl ProsocheDaemon {
    pub fn new(config: ProsocheConfig, collectors: Vec<Box<dyn Collector>>, http: reqwest::Client) -> Self {
        let budget = WakeBudget::new(
            config.budget.max_wakes_per_nous_per_hour,
            config.budget.max_wakes_total_per_hour,
            config.budget.cooldown_after_wake_seconds,
        );
        let activity_model = ActivityModel::load(&config.data_dir);

        Self {
            config,
            collectors,
            http,
            bundle: SignalBundle::default(),
            last_collection: HashMap::new(),
            budget,
            activity_model,
            last_activity_day: HashMap::new(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub async fn run(&mut self) {
        let nous_ids = self.config.nous_ids();
        info!(nous_count = nous_ids.len(), collector_count = self.collectors.len(), "prosoche starting");

        while self.running.load(Ordering::Relaxed) {
            if is_quiet_hours_now(&self.config) {
                debug!("quiet hours, sleeping 15 min");
                self.sleep_interruptible(Duration::from_secs(900)).await;
                continue;
            }

            self.collect_signals().await;
            self.evaluate_and_act().await;
            self.sleep_interruptible(Duration::from_secs(60)).await;
        }

        info!("prosoche shut down");
    }

    /// Sleeps in 5s increments so a SIGTERM/SIGINT flip of `running` is
    /// observed within 5s rather than blocking for the whole duration.
    async fn sleep_interruptible(&self, total: Duration) {
        let mut remaining = total;
        let step = Duration::from_secs(5);
        while remaining > Duration::ZERO && self.running.load(Ordering::Relaxed) {
            let chunk = remaining.min(step);
            tokio::time::sleep(chunk).await;
            remaining = remaining.saturating_sub(chunk);
        }
    }

    async fn collect_signals(&mut self) {
        let now = Instant::now();
        let mut new_signals: Vec<Signal> = Vec::new();

        for collector in &self.collectors {
            let name = collector.name();
            let interval = Duration::from_secs(self.config.signal(name).interval_seconds);
            if let Some(last) = self.last_collection.get(name) {
                if now.duration_since(*last) < interval {
                    continue;
                }
            }

            let signals = collector.collect(&self.config).await;
            if !signals.is_empty() {
                debug!(collector = name, count = signals.len(), "collected signals");
            }
            new_signals.extend(signals);
            self.last_collection.insert(name, now);
        }

        let local_now = current_local_time(&self.config);
        new_signals.extend(rhythm_signals(&self.config, &local_now));
        new_signals.extend(predictive_signals(&self.activity_model, &self.config, &local_now));

        if !new_signals.is_empty() {
            self.bundle = SignalBundle { signals: new_signals, collected_at: now.elapsed().as_secs_f64() };
        }
    }

    async fn evaluate_and_act(&mut self) {
        if self.bundle.signals.is_empty() {
            return;
        }

        for nous_id in self.config.nous_ids() {
            let weight_fn = |source: &str| self.config.weight_for(&nous_id, source);
            let score = score_nous(&nous_id, &self.bundle, &weight_fn);

            if score.top_signals.is_empty() {
                continue;
            }

            if update_prosoche(&nous_id, &score, &self.config.nous_root) {
                info!(nous_id, score = %format!("{:.2}", score.score), items = score.top_signals.len(), "staged attention");
            }

            if !score.should_wake {
                continue;
            }

            let summaries: Vec<&str> = score.top_signals.iter().map(|s| s.summary.as_str()).collect();
            let fingerprint = WakeBudget::fingerprint(&summaries);

            if self.budget.is_duplicate(&nous_id, &fingerprint) {
                continue;
            }
            if !self.budget.can_wake(&nous_id) {
                continue;
            }

            if trigger_wake(&self.http, &score, &self.config.gateway).await {
                self.budget.record_wake(&nous_id, &fingerprint);
                let local_now = current_local_time(&self.config);
                self.activity_model.record_activity(&nous_id, &local_now);

                // The source model's day counter has no caller in the
                // retrieved daemon loop; advance it once per local calendar
                // day so `has_enough_data` can ever become true.
                let today = local_now.date_naive();
                if self.last_activity_day.get(&nous_id) != Some(&today) {
                    self.activity_model.record_day(&nous_id);
                    self.last_activity_day.insert(nous_id.clone(), today);
                }
            }
        }
    }
}

fn is_quiet_hours_now(config: &ProsocheConfig) -> bool {
    let Some(start) = config.quiet_hours.start.as_deref() else { return false };
    let Some(end) = config.quiet_hours.end.as_deref() else { return false };
    let now = current_local_time(config);
    let minutes = now.hour() * 60 + now.minute();
    crate::config::is_quiet_hours(minutes, start, end)
}

fn current_local_time(config: &ProsocheConfig) -> chrono::DateTime<chrono_tz::Tz> {
    let tz: chrono_tz::Tz = config.quiet_hours.timezone.parse().unwrap_or(chrono_tz::UTC);
    Utc::now().with_timezone(&tz)
}

/// Installs SIGTERM/SIGINT handlers that flip `running` to false.
pub fn install_signal_handlers(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("received SIGINT"),
                _ = sigterm.recv() => info!("received SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            if ctrl_c.await.is_err() {
                warn!("ctrl_c handler failed");
            }
            info!("received ctrl-c");
        }
        running.store(false, Ordering::Relaxed);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use std::path::PathBuf;

    fn test_config() -> ProsocheConfig {
        ProsocheConfig {
            nous_root: PathBuf::new(),
            nous: Map::new(),
            signals: Map::new(),
            gateway: Default::default(),
            budget: Default::default(),
            quiet_hours: crate::config::QuietHoursConfig {
                start: Some("23:00".into()),
                end: Some("07:00".into()),
                timezone: "UTC".into(),
            },
            rhythm: Default::default(),
            data_dir: PathBuf::new(),
        }
    }

    #[test]
    fn quiet_hours_gate_uses_configured_window() {
        let config = test_config();
        // This just checks the wiring compiles and reaches the is_quiet_hours
        // helper correctly; exact wall-clock behavior is covered in config::tests.
        let _ = is_quiet_hours_now(&config);
    }
}
