//! Temporal engine (C6): bi-temporal episodes and facts.

use chrono::{DateTime, Utc};

use crate::engine::MemoryEngine;
use crate::entity::extract_entities;
use crate::error::Result;
use crate::model::{Episode, MemoryPoint, TemporalFact};

pub struct WhatChanged {
    pub invalidated: Vec<TemporalFact>,
    pub created: Vec<TemporalFact>,
}

impl MemoryEngine {
    pub async fn create_episode(
        &self,
        content: &str,
        agent_id: &str,
        session_id: &str,
        source: &str,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<Episode> {
        let episode = Episode {
            id: Episode::new_id(),
            content_preview: MemoryPoint::preview_of(content),
            agent_id: Some(agent_id.to_string()),
            session_id: Some(session_id.to_string()),
            source: source.to_string(),
            occurred_at: occurred_at.unwrap_or_else(Utc::now),
            recorded_at: Utc::now(),
            mentions: extract_entities(content, 10),
        };
        self.graph
            .upsert_entity(&episode.id, &["Episode".to_string()])
            .await?;
        for mention in &episode.mentions {
            self.graph.upsert_entity(mention, &[]).await?;
        }
        Ok(episode)
    }

    /// Create a new open-ended fact. If a contradictory fact (same
    /// subject+predicate, still open) exists, the caller decides whether to
    /// invalidate it first — this just writes the new one.
    pub async fn create_fact(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        occurred_at: Option<DateTime<Utc>>,
        confidence: f32,
        source_episode_id: Option<String>,
    ) -> Result<TemporalFact> {
        let now = Utc::now();
        let fact = TemporalFact {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            valid_from: now,
            valid_to: None,
            occurred_at: occurred_at.unwrap_or(now),
            recorded_at: now,
            confidence,
            source_episode_id,
            invalidation_reason: None,
        };
        self.graph.create_temporal_fact(&fact).await?;
        Ok(fact)
    }

    pub async fn invalidate_fact(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        reason: &str,
    ) -> Result<u64> {
        self.graph
            .invalidate_fact(subject, predicate, object, Utc::now(), reason)
            .await
    }

    pub async fn query_since(&self, since: DateTime<Utc>) -> Result<Vec<TemporalFact>> {
        self.graph.facts_since(since).await
    }

    /// Facts invalidated and created within `[since, now]` — a changelog.
    pub async fn what_changed(&self, since: DateTime<Utc>) -> Result<WhatChanged> {
        let facts = self.graph.facts_since(since).await?;
        let (invalidated, created) = facts.into_iter().partition(|f| f.invalidation_reason.is_some());
        Ok(WhatChanged { invalidated, created })
    }

    /// Point-in-time knowledge: facts whose validity window contains `at`.
    pub async fn at_time(
        &self,
        subject: &str,
        predicate: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TemporalFact>> {
        self.graph.facts_at_time(subject, predicate, at).await
    }
}
