//! Learned per-agent activity model: hourly bins keyed by day-of-week,
//! persisted to `data_dir/activity_model.json`. Feeds readiness signals once
//! enough history has accumulated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{ProsocheConfig, HIGH_ACTIVITY_THRESHOLD, MIN_OBSERVATIONS};
use crate::signals::{ContextBlock, Signal};

#[derive(Debug, Serialize, Deserialize, Default)]
struct PersistedModel {
    #[serde(default)]
    observations: HashMap<String, HashMap<String, u32>>,
    #[serde(default)]
    total_days: HashMap<String, u32>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// `(day_of_week: 0=Mon, hour: 0-23)` per-nous observation counts with a
/// running total-days-observed counter, used to gate prediction confidence.
pub struct ActivityModel {
    data_dir: PathBuf,
    observations: HashMap<String, HashMap<String, u32>>,
    total_days: HashMap<String, u32>,
}

fn bin_key(day: u32, hour: u32) -> String {
    format!("{day}:{hour}")
}

impl ActivityModel {
    pub fn load(data_dir: &Path) -> Self {
        if let Err(e) = std::fs::create_dir_all(data_dir) {
            warn!(dir = %data_dir.display(), error = %e, "failed to create activity model directory");
        }
        let path = data_dir.join("activity_model.json");
        let persisted: PersistedModel = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            data_dir: data_dir.to_path_buf(),
            observations: persisted.observations,
            total_days: persisted.total_days,
        }
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join("activity_model.json")
    }

    fn save(&self) {
        let persisted = PersistedModel {
            observations: self.observations.clone(),
            total_days: self.total_days.clone(),
            updated_at: Some(Utc::now()),
        };
        match serde_json::to_string_pretty(&persisted) {
            Ok(json) => {
                if let Err(e) = std::fs::write(self.path(), json) {
                    warn!(error = %e, "failed to persist activity model");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize activity model"),
        }
    }

    /// Records that `nous_id` was active at `dt` (in its local day/hour bin).
    pub fn record_activity(&mut self, nous_id: &str, dt: &DateTime<Tz>) {
        let key = bin_key(dt.weekday().num_days_from_monday(), dt.hour());
        *self.observations.entry(nous_id.to_string()).or_default().entry(key).or_insert(0) += 1;
    }

    /// Marks another day observed for `nous_id` and persists the model.
    pub fn record_day(&mut self, nous_id: &str) {
        *self.total_days.entry(nous_id.to_string()).or_insert(0) += 1;
        self.save();
    }

    pub fn has_enough_data(&self, nous_id: &str) -> bool {
        self.total_days.get(nous_id).copied().unwrap_or(0) >= MIN_OBSERVATIONS
    }

    /// Predicted activity level in `[0, 1]`, normalized against the
    /// observed max frequency. Returns `0.5` (neutral) before the model has
    /// enough history.
    pub fn predict_activity(&self, nous_id: &str, day: u32, hour: u32) -> f64 {
        if !self.has_enough_data(nous_id) {
            return 0.5;
        }
        let Some(obs) = self.observations.get(nous_id) else { return 0.5 };
        let count = obs.get(&bin_key(day, hour)).copied().unwrap_or(0);
        let max_count = obs.values().copied().max().unwrap_or(1).max(1);
        (count as f64 / max_count as f64).min(1.0)
    }

    /// Hours on `day` whose observation count is at or above
    /// [`HIGH_ACTIVITY_THRESHOLD`] of the observed max.
    pub fn peak_hours(&self, nous_id: &str, day: u32) -> Vec<u32> {
        if !self.has_enough_data(nous_id) {
            return Vec::new();
        }
        let Some(obs) = self.observations.get(nous_id) else { return Vec::new() };
        let max_count = obs.values().copied().max().unwrap_or(1).max(1);
        let threshold = max_count as f64 * HIGH_ACTIVITY_THRESHOLD;

        (0..24).filter(|&hour| obs.get(&bin_key(day, hour)).copied().unwrap_or(0) as f64 >= threshold).collect()
    }
}

/// Emits a readiness signal for each agent whose model has enough history
/// and is within 15 minutes of a predicted peak hour.
pub fn predictive_signals(model: &ActivityModel, config: &ProsocheConfig, now: &DateTime<Tz>) -> Vec<Signal> {
    let day = now.weekday().num_days_from_monday();
    let mut signals = Vec::new();

    for nous_id in config.nous_ids() {
        if !model.has_enough_data(&nous_id) {
            continue;
        }
        let peaks = model.peak_hours(&nous_id, day);
        if peaks.is_empty() {
            continue;
        }

        let next_hour = (now.hour() + 1) % 24;
        if peaks.contains(&next_hour) && now.minute() >= 45 {
            let activity = model.predict_activity(&nous_id, day, now.hour());
            let minutes_left = 60 - now.minute();
            let peak_list = peaks.iter().map(|h| format!("{h}:00")).collect::<Vec<_>>().join(", ");
            signals.push(
                Signal::new(
                    "prediction",
                    format!("Peak activity predicted for {nous_id} in ~{minutes_left}min"),
                    0.3,
                )
                .with_nous(vec![nous_id.clone()])
                .with_context(vec![ContextBlock {
                    title: format!("Activity Forecast: {nous_id}"),
                    content: format!("Today's peak hours: {peak_list}\nCurrent activity level: {activity:.2}"),
                    source: "prediction".to_string(),
                    expires_at: None,
                }]),
            );
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_prediction_before_enough_data() {
        let dir = tempfile::tempdir().unwrap();
        let model = ActivityModel::load(dir.path());
        assert_eq!(model.predict_activity("syn", 0, 9), 0.5);
        assert!(model.peak_hours("syn", 0).is_empty());
    }

    #[test]
    fn peak_hours_reach_threshold_after_enough_days() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = ActivityModel::load(dir.path());
        for _ in 0..MIN_OBSERVATIONS {
            model.record_day("syn");
        }
        for _ in 0..10 {
            *model.observations.entry("syn".into()).or_default().entry(bin_key(0, 9)).or_insert(0) += 1;
        }
        *model.observations.entry("syn".into()).or_default().entry(bin_key(0, 14)).or_insert(0) += 1;

        assert!(model.has_enough_data("syn"));
        let peaks = model.peak_hours("syn", 0);
        assert!(peaks.contains(&9));
        assert!(!peaks.contains(&14));
    }

    #[test]
    fn activity_model_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut model = ActivityModel::load(dir.path());
            model.record_day("syn");
        }
        let model = ActivityModel::load(dir.path());
        assert_eq!(model.total_days.get("syn"), Some(&1));
    }
}
