//! YAML configuration with `${VAR}` environment expansion, mirroring how the
//! memory sidecar loads its own environment-driven config but sourced from a
//! file since the daemon's shape (per-agent weights, per-signal settings) is
//! too nested for bare env vars.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

/// 3 weeks of daily observations before the activity model's predictions are
/// trusted.
pub const MIN_OBSERVATIONS: u32 = 21;

/// Top 30% of observed bins, by count, are considered "peak" hours.
pub const HIGH_ACTIVITY_THRESHOLD: f64 = 0.7;

/// Raw signal urgency at/above which the scorer treats a top-5 signal as
/// wake-worthy.
pub const URGENT_THRESHOLD: f64 = 0.8;

/// Weight applied to a signal source with no explicit per-agent weight.
pub const DEFAULT_SIGNAL_WEIGHT: f64 = 0.1;

/// Wake fingerprints are suppressed as duplicates within this window.
pub const DEDUP_WINDOW_SECS: u64 = 8 * 3600;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NousConfig {
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SignalConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

fn default_interval() -> u64 {
    300
}

impl SignalConfig {
    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.extra.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.extra.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.extra
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_str_map(&self, key: &str) -> HashMap<String, String> {
        self.extra
            .get(key)
            .and_then(Value::as_mapping)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(Value::as_sequence)
            .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_per_nous")]
    pub max_wakes_per_nous_per_hour: u32,
    #[serde(default = "default_max_total")]
    pub max_wakes_total_per_hour: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_after_wake_seconds: u64,
}

fn default_max_per_nous() -> u32 {
    2
}
fn default_max_total() -> u32 {
    6
}
fn default_cooldown() -> u64 {
    300
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_wakes_per_nous_per_hour: default_max_per_nous(),
            max_wakes_total_per_hour: default_max_total(),
            cooldown_after_wake_seconds: default_cooldown(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QuietHoursConfig {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RhythmConfig {
    #[serde(default)]
    pub morning_prep: Option<String>,
    #[serde(default)]
    pub midday_check: Option<String>,
    #[serde(default)]
    pub evening_review: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProsocheConfig {
    pub nous_root: PathBuf,
    #[serde(default)]
    pub nous: HashMap<String, NousConfig>,
    #[serde(default)]
    pub signals: HashMap<String, SignalConfig>,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub quiet_hours: QuietHoursConfig,
    #[serde(default)]
    pub rhythm: RhythmConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/prosoche")
}

impl ProsocheConfig {
    pub fn nous_ids(&self) -> Vec<String> {
        self.nous.keys().cloned().collect()
    }

    pub fn signal(&self, name: &str) -> SignalConfig {
        self.signals.get(name).cloned().unwrap_or_default()
    }

    pub fn weight_for(&self, nous_id: &str, source: &str) -> f64 {
        self.nous
            .get(nous_id)
            .and_then(|n| n.weights.get(source).copied())
            .unwrap_or(DEFAULT_SIGNAL_WEIGHT)
    }
}

fn default_config_path() -> PathBuf {
    if let Ok(root) = std::env::var("ALETHEIA_ROOT") {
        return PathBuf::from(root).join("infrastructure/prosoche/config.yaml");
    }
    PathBuf::from("config.yaml")
}

/// Recursively substitutes `${VAR}` references in string scalars with the
/// corresponding environment variable, leaving the reference untouched if the
/// variable is unset.
fn expand_env(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_str(&s)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(expand_env).collect()),
        Value::Mapping(map) => {
            Value::Mapping(map.into_iter().map(|(k, v)| (expand_env(k), expand_env(v))).collect())
        }
        other => other,
    }
}

fn expand_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                match std::env::var(var) {
                    Ok(val) => out.push_str(&val),
                    Err(_) => out.push_str(&rest[start..start + 3 + end]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<ProsocheConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("config not found at {}: {e}", path.display()))?;
    let value: Value = serde_yaml::from_str(&raw)?;
    let expanded = expand_env(value);
    Ok(serde_yaml::from_value(expanded)?)
}

/// `quiet_hours.start/end` are "HH:MM" in the configured timezone; a range
/// where `start > end` wraps past midnight.
pub fn is_quiet_hours(now_minutes: u32, start: &str, end: &str) -> bool {
    let parse = |s: &str| -> Option<u32> {
        let (h, m) = s.split_once(':')?;
        Some(h.parse::<u32>().ok()? * 60 + m.parse::<u32>().ok()?)
    };
    match (parse(start), parse(end)) {
        (Some(start), Some(end)) if start > end => now_minutes >= start || now_minutes < end,
        (Some(start), Some(end)) => start <= now_minutes && now_minutes < end,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_var() {
        unsafe {
            std::env::set_var("PROSOCHE_TEST_VAR", "resolved");
        }
        assert_eq!(expand_str("prefix-${PROSOCHE_TEST_VAR}-suffix"), "prefix-resolved-suffix");
    }

    #[test]
    fn leaves_unknown_var_untouched() {
        assert_eq!(expand_str("${PROSOCHE_DOES_NOT_EXIST}"), "${PROSOCHE_DOES_NOT_EXIST}");
    }

    #[test]
    fn quiet_hours_straight_range() {
        assert!(is_quiet_hours(23 * 60, "22:00", "23:30"));
        assert!(!is_quiet_hours(10 * 60, "22:00", "23:30"));
    }

    #[test]
    fn quiet_hours_wraps_past_midnight() {
        assert!(is_quiet_hours(23 * 60 + 30, "23:00", "07:00"));
        assert!(is_quiet_hours(3 * 60, "23:00", "07:00"));
        assert!(!is_quiet_hours(12 * 60, "23:00", "07:00"));
    }
}
