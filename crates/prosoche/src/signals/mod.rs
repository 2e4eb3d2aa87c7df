//! Shared signal types produced by every collector and consumed by the scorer.

pub mod calendar;
pub mod health;
pub mod hex;
pub mod memory;
pub mod redshift;
pub mod tasks;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ProsocheConfig;

/// Pre-assembled context to stage for an agent's next turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    pub title: String,
    pub content: String,
    /// Which signal collector produced this.
    pub source: String,
    /// UTC; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub source: String,
    pub summary: String,
    /// 0.0 = informational, 1.0 = critical.
    pub urgency: f64,
    /// Empty means relevant to every agent.
    pub relevant_nous: Vec<String>,
    pub details: String,
    pub context_blocks: Vec<ContextBlock>,
}

impl Signal {
    pub fn new(source: impl Into<String>, summary: impl Into<String>, urgency: f64) -> Self {
        Self {
            source: source.into(),
            summary: summary.into(),
            urgency,
            relevant_nous: Vec::new(),
            details: String::new(),
            context_blocks: Vec::new(),
        }
    }

    pub fn with_nous(mut self, nous: Vec<String>) -> Self {
        self.relevant_nous = nous;
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    pub fn with_context(mut self, blocks: Vec<ContextBlock>) -> Self {
        self.context_blocks = blocks;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalBundle {
    pub signals: Vec<Signal>,
    pub collected_at: f64,
}

impl SignalBundle {
    pub fn for_nous(&self, nous_id: &str) -> Vec<&Signal> {
        self.signals
            .iter()
            .filter(|s| s.relevant_nous.is_empty() || s.relevant_nous.iter().any(|n| n == nous_id))
            .collect()
    }
}

/// One independent signal source, gated by its own configured interval and
/// allowed to fail locally without affecting any other collector.
#[async_trait]
pub trait Collector: Send + Sync {
    fn name(&self) -> &'static str;
    async fn collect(&self, config: &ProsocheConfig) -> Vec<Signal>;
}
