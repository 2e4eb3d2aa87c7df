//! Fixed daily-rhythm windows: morning prep, midday check, evening review.

use chrono::{DateTime, Timelike};
use chrono_tz::Tz;

use crate::config::ProsocheConfig;
use crate::signals::Signal;

const WINDOW_MINUTES: u32 = 30;

fn morning_signals() -> Vec<Signal> {
    vec![
        Signal::new("rhythm", "Morning: review calendar and tasks for today", 0.5)
            .with_nous(vec!["syn".into(), "syl".into()]),
        Signal::new("rhythm", "Morning: check overnight alerts and system health", 0.4)
            .with_nous(vec!["syn".into()]),
    ]
}

fn midday_signals() -> Vec<Signal> {
    vec![Signal::new("rhythm", "Midday: check task progress and afternoon calendar", 0.3)
        .with_nous(vec!["syn".into(), "arbor".into(), "eiron".into()])]
}

fn evening_signals() -> Vec<Signal> {
    vec![Signal::new("rhythm", "Evening: review what happened today, pending items for tomorrow", 0.3)
        .with_nous(vec!["syn".into()])]
}

fn parse_hm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    Some(h.parse::<u32>().ok()? * 60 + m.parse::<u32>().ok()?)
}

fn in_window(target_minutes: Option<u32>, current_minutes: u32) -> bool {
    match target_minutes {
        Some(target) => (target..target + WINDOW_MINUTES).contains(&current_minutes),
        None => false,
    }
}

/// Emits each configured rhythm's preset signals while `now` falls within
/// its `[target, target + 30min)` window.
pub fn rhythm_signals(config: &ProsocheConfig, now: &DateTime<Tz>) -> Vec<Signal> {
    let current = now.hour() * 60 + now.minute();
    let mut signals = Vec::new();

    if in_window(config.rhythm.morning_prep.as_deref().and_then(parse_hm), current) {
        signals.extend(morning_signals());
    }
    if in_window(config.rhythm.midday_check.as_deref().and_then(parse_hm), current) {
        signals.extend(midday_signals());
    }
    if in_window(config.rhythm.evening_review.as_deref().and_then(parse_hm), current) {
        signals.extend(evening_signals());
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_window_matches() {
        assert!(in_window(Some(7 * 60), 7 * 60 + 10));
        assert!(!in_window(Some(7 * 60), 7 * 60 + 31));
        assert!(!in_window(Some(7 * 60), 6 * 60 + 59));
    }

    #[test]
    fn unset_rhythm_never_matches() {
        assert!(!in_window(None, 420));
    }
}
