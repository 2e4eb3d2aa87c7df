//! Per-agent attention scoring over the active signal bundle.

use chrono::Utc;

use crate::config::{DEFAULT_SIGNAL_WEIGHT, URGENT_THRESHOLD};
use crate::signals::{ContextBlock, Signal, SignalBundle};

#[derive(Debug, Clone, Default)]
pub struct NousScore {
    pub nous_id: String,
    pub score: f64,
    pub top_signals: Vec<Signal>,
    pub staged_context: Vec<ContextBlock>,
    pub should_wake: bool,
}

/// Scores `bundle` for `nous_id` using per-source weights (defaulting to
/// [`DEFAULT_SIGNAL_WEIGHT`] for any source without an explicit entry).
/// `composite = 0.7 * top + 0.3 * avg` of the weighted urgencies;
/// `should_wake` fires if any of the top-5 weighted signals carries a raw
/// urgency at or above [`URGENT_THRESHOLD`].
pub fn score_nous(nous_id: &str, bundle: &SignalBundle, weights: &dyn Fn(&str) -> f64) -> NousScore {
    let relevant = bundle.for_nous(nous_id);
    if relevant.is_empty() {
        return NousScore { nous_id: nous_id.to_string(), ..Default::default() };
    }

    let mut weighted: Vec<(&Signal, f64)> = relevant
        .iter()
        .map(|s| (*s, s.urgency * weights(&s.source)))
        .collect();
    weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let top_score = weighted[0].1;
    let avg_score = weighted.iter().map(|(_, w)| w).sum::<f64>() / weighted.len() as f64;
    let composite = top_score * 0.7 + avg_score * 0.3;

    let top_signals: Vec<Signal> = weighted.iter().take(5).map(|(s, _)| (*s).clone()).collect();

    let now = Utc::now();
    let staged_context: Vec<ContextBlock> = relevant
        .iter()
        .flat_map(|s| s.context_blocks.iter())
        .filter(|b| b.expires_at.is_none_or(|exp| exp > now))
        .cloned()
        .collect();

    let should_wake = top_signals.iter().any(|s| s.urgency >= URGENT_THRESHOLD);

    NousScore {
        nous_id: nous_id.to_string(),
        score: composite,
        top_signals,
        staged_context,
        should_wake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bundle(signals: Vec<Signal>) -> SignalBundle {
        SignalBundle { signals, collected_at: 0.0 }
    }

    #[test]
    fn empty_relevance_yields_zero_score() {
        let b = bundle(vec![Signal::new("tasks", "irrelevant", 0.9).with_nous(vec!["other".into()])]);
        let score = score_nous("syn", &b, &|_| DEFAULT_SIGNAL_WEIGHT);
        assert_eq!(score.score, 0.0);
        assert!(!score.should_wake);
    }

    #[test]
    fn composite_matches_weighted_formula() {
        let b = bundle(vec![
            Signal::new("health", "disk critical", 1.0),
            Signal::new("tasks", "overdue", 0.5),
        ]);
        let weight = |src: &str| if src == "health" { 1.0 } else { 0.5 };
        let score = score_nous("syn", &b, &weight);
        // weighted: health=1.0, tasks=0.25 -> top=1.0 avg=0.625 -> 0.7*1.0+0.3*0.625
        assert!((score.score - (0.7 * 1.0 + 0.3 * 0.625)).abs() < 1e-9);
    }

    #[test]
    fn should_wake_requires_raw_urgency_in_top_five() {
        let b = bundle(vec![Signal::new("health", "urgent", 0.85)]);
        let score = score_nous("syn", &b, &|_| 0.1);
        assert!(score.should_wake);
    }

    #[test]
    fn expired_context_blocks_are_dropped() {
        let expired = ContextBlock {
            title: "old".into(),
            content: "stale".into(),
            source: "memory".into(),
            expires_at: Some(Utc::now() - Duration::hours(1)),
        };
        let live = ContextBlock {
            title: "fresh".into(),
            content: "current".into(),
            source: "memory".into(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        };
        let b = bundle(vec![Signal::new("memory", "state", 0.2).with_context(vec![expired, live.clone()])]);
        let score = score_nous("syn", &b, &|_| 0.1);
        assert_eq!(score.staged_context, vec![live]);
    }
}
