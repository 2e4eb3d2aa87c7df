//! Ingestion engine (C4): dedup-aware writes into the vector and graph
//! stores, with graceful degradation when the graph half is unreachable.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::Tier;
use crate::config::{
    graph_extraction_prompt, DEDUP_THRESHOLD, DIRECT_DEDUP_THRESHOLD, LINK_MAX_NEIGHBORS,
    LINK_SCORE_THRESHOLD,
};
use crate::engine::MemoryEngine;
use crate::entity::{extract_entities, resolve_entity};
use crate::error::{CoreError, Result};
use crate::model::{Episode, MemoryPoint};
use crate::vocab::{normalize_type, CONTROLLED_VOCAB};

pub struct AddOutcome {
    pub id: Option<Uuid>,
    pub deduplicated: bool,
    pub existing_id: Option<Uuid>,
    pub graph_degraded: bool,
    pub tier3_embed_only: bool,
}

pub struct ExtractedFact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f32,
    pub domain: Option<String>,
    pub agent: Option<String>,
}

impl MemoryEngine {
    /// Full pipeline: cross-agent dedup check, tier-aware fact extraction,
    /// dual write to vector + graph, best-effort episode recording and
    /// relationship-type normalization.
    pub async fn add(
        &self,
        text: &str,
        user_id: &str,
        agent_id: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<AddOutcome> {
        let embedding = self.embeddings.embed(text).await?;

        if let Some(existing) = self.vector.search(&embedding, 3, Some(user_id)).await.ok() {
            if let Some(top) = existing.into_iter().next() {
                if top.score > DEDUP_THRESHOLD {
                    tracing::info!(
                        score = top.score,
                        existing_id = %top.point.id,
                        "dedup: skipped"
                    );
                    return Ok(AddOutcome {
                        id: None,
                        deduplicated: true,
                        existing_id: Some(top.point.id),
                        graph_degraded: false,
                        tier3_embed_only: false,
                    });
                }
            }
        }

        if self.backend.tier == Tier::None {
            tracing::info!("tier 3: storing text as embedding only");
            let point = MemoryPoint {
                id: Uuid::new_v4(),
                text_preview: MemoryPoint::preview_of(text),
                full_text: text.to_string(),
                content_hash: MemoryPoint::content_hash(text),
                user_id: user_id.to_string(),
                agent_id: agent_id.map(str::to_string),
                source: "tier3".to_string(),
                session_id: None,
                confidence: 0.5,
                created_at: Utc::now(),
                metadata,
            };
            self.vector.upsert(&point, &embedding).await?;
            return Ok(AddOutcome {
                id: Some(point.id),
                deduplicated: false,
                existing_id: None,
                graph_degraded: false,
                tier3_embed_only: true,
            });
        }

        let point = MemoryPoint {
            id: Uuid::new_v4(),
            text_preview: MemoryPoint::preview_of(text),
            full_text: text.to_string(),
            content_hash: MemoryPoint::content_hash(text),
            user_id: user_id.to_string(),
            agent_id: agent_id.map(str::to_string),
            source: "llm_extracted".to_string(),
            session_id: None,
            confidence: 0.8,
            created_at: Utc::now(),
            metadata,
        };

        self.vector.upsert(&point, &embedding).await?;

        let mut graph_degraded = false;
        match self.write_graph_facts(text, &point.id).await {
            Ok(()) => {
                self.spawn_post_commit(
                    text.to_string(),
                    user_id.to_string(),
                    agent_id.map(str::to_string),
                    point.id,
                    point.text_preview.clone(),
                );
            }
            Err(e) if e.is_transient_graph() => {
                tracing::warn!(error = %e, "graph write failed, vector portion saved");
                graph_degraded = true;
            }
            Err(e) => return Err(e),
        }

        Ok(AddOutcome {
            id: Some(point.id),
            deduplicated: false,
            existing_id: None,
            graph_degraded,
            tier3_embed_only: false,
        })
    }

    /// Store a single pre-extracted fact directly, bypassing LLM extraction.
    pub async fn add_direct(
        &self,
        text: &str,
        user_id: &str,
        confidence: f32,
    ) -> Result<AddOutcome> {
        let embedding = self.embeddings.embed(text).await?;

        let dup = self
            .vector
            .search(&embedding, 1, Some(user_id))
            .await?
            .into_iter()
            .next()
            .map(|s| s.score >= DIRECT_DEDUP_THRESHOLD)
            .unwrap_or(false);

        if dup {
            return Ok(AddOutcome {
                id: None,
                deduplicated: true,
                existing_id: None,
                graph_degraded: false,
                tier3_embed_only: false,
            });
        }

        let point = MemoryPoint {
            id: Uuid::new_v4(),
            text_preview: MemoryPoint::preview_of(text),
            full_text: text.to_string(),
            content_hash: MemoryPoint::content_hash(text),
            user_id: user_id.to_string(),
            agent_id: None,
            source: "direct".to_string(),
            session_id: None,
            confidence,
            created_at: Utc::now(),
            metadata: serde_json::Value::Null,
        };
        self.vector.upsert(&point, &embedding).await?;

        Ok(AddOutcome {
            id: Some(point.id),
            deduplicated: false,
            existing_id: None,
            graph_degraded: false,
            tier3_embed_only: false,
        })
    }

    /// Batch variant of `add_direct`; each item is independent, one failure
    /// doesn't abort the rest.
    pub async fn add_batch(
        &self,
        texts: &[String],
        user_id: &str,
        confidence: f32,
    ) -> Result<Vec<Result<AddOutcome>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.add_direct(text, user_id, confidence).await);
        }
        Ok(out)
    }

    /// Import pre-extracted (subject, predicate, object) facts by joining
    /// each into a sentence and routing it through the normal `add` pipeline
    /// so dedup, embedding, and graph writes stay consistent with memories
    /// entered any other way.
    pub async fn import_facts(&self, facts: &[ExtractedFact], user_id: &str) -> Result<u64> {
        let mut written = 0u64;
        for fact in facts {
            let sentence = format!(
                "{} {} {}.",
                fact.subject,
                fact.predicate.replace('_', " ").to_lowercase(),
                fact.object
            );
            let metadata = serde_json::json!({
                "source": "import",
                "confidence": fact.confidence,
                "domain": fact.domain,
            });
            let outcome = self
                .add(&sentence, user_id, fact.agent.as_deref(), metadata)
                .await?;
            if outcome.id.is_some() {
                written += 1;
            }
        }
        Ok(written)
    }

    /// List a user's memories, most recently created first.
    pub async fn list_memories(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryPoint>> {
        let mut points = self.vector.list_all(user_id, limit).await?;
        points.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(points)
    }

    /// Delete a single memory by id from the vector store.
    pub async fn delete_memory(&self, id: &str) -> Result<()> {
        self.vector.delete(id).await
    }

    /// Delegates to the fact-extraction LLM, resolves each extracted
    /// subject/object against known aliases, and writes the result as
    /// bi-temporal facts rather than heuristic co-mention edges.
    async fn write_graph_facts(&self, text: &str, memory_id: &Uuid) -> Result<()> {
        if !self.graph.is_available().await {
            return Err(CoreError::Graph("graph_unavailable".to_string()));
        }

        let facts = self.extract_facts(text).await?;
        let mut canonical_names = Vec::new();

        for raw in facts {
            let subject = resolve_entity(&raw.subject, &self.aliases, &canonical_names)
                .unwrap_or(raw.subject.clone());
            let object = resolve_entity(&raw.object, &self.aliases, &canonical_names)
                .unwrap_or(raw.object.clone());
            canonical_names.push(subject.clone());
            canonical_names.push(object.clone());

            let predicate = normalize_type(&raw.predicate);
            self.create_fact(
                &subject,
                predicate,
                &object,
                None,
                raw.confidence,
                Some(memory_id.to_string()),
            )
            .await?;
        }

        Ok(())
    }

    /// Asks the configured LLM to extract subject/predicate/object facts
    /// from `text`, constrained to the controlled relationship vocabulary.
    /// Returns an empty list (never an error) when no LLM backend is
    /// available or the completion can't be parsed — graph extraction is
    /// best-effort on top of the vector write that already succeeded.
    async fn extract_facts(&self, text: &str) -> Result<Vec<RawFact>> {
        if !self.llm.extraction_enabled() {
            return Ok(Vec::new());
        }

        let system = graph_extraction_prompt(CONTROLLED_VOCAB);
        let prompt = format!(
            "Extract factual (subject, predicate, object) triples from the following text. \
             Respond with ONLY a JSON array of objects, each with keys \"subject\", \"predicate\", \
             \"object\", and \"confidence\" (0.0-1.0). If no facts are present, respond with [].\n\n\
             Text: {text}"
        );

        match self.llm.complete(&system, &prompt).await {
            Ok(raw) => Ok(parse_extracted_facts(&raw)),
            Err(e) => {
                tracing::warn!(error = %e, "fact extraction failed, skipping graph write");
                Ok(Vec::new())
            }
        }
    }

    /// Bounded fire-and-forget work that runs after a memory is durably
    /// written: episode recording (when the write came from an agent) and
    /// similarity-based link generation against the rest of the user's
    /// corpus. Bounded by `self.post_commit` so a burst of ingests can't
    /// spawn unbounded background tasks.
    fn spawn_post_commit(
        &self,
        text: String,
        user_id: String,
        agent_id: Option<String>,
        memory_id: Uuid,
        preview: String,
    ) {
        let permits = Arc::clone(&self.post_commit);
        let vector = Arc::clone(&self.vector);
        let graph = Arc::clone(&self.graph);
        let embeddings = self.embeddings.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };

            if let Some(agent) = agent_id.as_deref() {
                let episode = Episode {
                    id: Episode::new_id(),
                    content_preview: MemoryPoint::preview_of(&text),
                    agent_id: Some(agent.to_string()),
                    session_id: None,
                    source: memory_id.to_string(),
                    occurred_at: Utc::now(),
                    recorded_at: Utc::now(),
                    mentions: extract_entities(&text, 10),
                };
                if let Err(e) = graph.upsert_entity(&episode.id, &["Episode".to_string()]).await {
                    tracing::warn!(error = %e, "post-commit: episode recording failed");
                }
            }

            let embedding = match embeddings.embed(&text).await {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "post-commit: re-embed for link generation failed");
                    return;
                }
            };

            let neighbors = match vector
                .search(&embedding, LINK_MAX_NEIGHBORS + 1, Some(&user_id))
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(error = %e, "post-commit: neighbor search failed");
                    return;
                }
            };

            let mut linked = 0usize;
            for hit in neighbors {
                if linked >= LINK_MAX_NEIGHBORS {
                    break;
                }
                if hit.point.id == memory_id || hit.score < LINK_SCORE_THRESHOLD {
                    continue;
                }
                let description = format!("related memory (similarity {:.2})", hit.score);
                if let Err(e) = graph
                    .create_link(&preview, &hit.point.text_preview, &description, hit.score)
                    .await
                {
                    tracing::warn!(error = %e, "post-commit: link creation failed");
                    continue;
                }
                linked += 1;
            }
        });
    }
}

struct RawFact {
    subject: String,
    predicate: String,
    object: String,
    confidence: f32,
}

#[derive(Deserialize)]
struct RawFactJson {
    subject: String,
    predicate: String,
    object: String,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Pulls the first `[...]` JSON array substring out of `raw` (LLMs routinely
/// wrap their JSON in prose or code fences) and parses it into facts,
/// dropping entries with an empty subject or object.
fn parse_extracted_facts(raw: &str) -> Vec<RawFact> {
    let Some(start) = raw.find('[') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    let slice = &raw[start..=end];
    let parsed: Vec<RawFactJson> = match serde_json::from_str(slice) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "fact extraction: could not parse llm response");
            return Vec::new();
        }
    };

    parsed
        .into_iter()
        .filter(|f| !f.subject.trim().is_empty() && !f.object.trim().is_empty())
        .map(|f| RawFact {
            subject: f.subject,
            predicate: f.predicate,
            object: f.object,
            confidence: f.confidence.unwrap_or(0.7).clamp(0.0, 1.0),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_facts_wrapped_in_prose() {
        let raw = "Here are the facts:\n[{\"subject\": \"Alice\", \"predicate\": \"works_at\", \"object\": \"Acme\", \"confidence\": 0.9}]\nHope that helps.";
        let facts = parse_extracted_facts(raw);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].subject, "Alice");
        assert_eq!(facts[0].object, "Acme");
        assert!((facts[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn defaults_missing_confidence() {
        let raw = r#"[{"subject": "Bob", "predicate": "likes", "object": "Tea"}]"#;
        let facts = parse_extracted_facts(raw);
        assert_eq!(facts.len(), 1);
        assert!((facts[0].confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn drops_facts_with_empty_subject_or_object() {
        let raw = r#"[{"subject": "", "predicate": "likes", "object": "Tea"}]"#;
        assert!(parse_extracted_facts(raw).is_empty());
    }

    #[test]
    fn empty_array_yields_no_facts() {
        assert!(parse_extracted_facts("[]").is_empty());
    }

    #[test]
    fn unparseable_response_yields_no_facts() {
        assert!(parse_extracted_facts("not json at all").is_empty());
    }
}
