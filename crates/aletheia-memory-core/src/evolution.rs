//! Evolution and consolidation engine (C7): merges near-duplicate memories,
//! reinforces/decays access-weighted confidence, and retracts memories on
//! request.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{
    CONSOLIDATE_DEFAULT_THRESHOLD, EVOLUTION_THRESHOLD, RETRACTION_SCORE_THRESHOLD,
};
use crate::engine::MemoryEngine;
use crate::entity::extract_entities;
use crate::error::Result;
use crate::model::MemoryPoint;
use crate::vocab::{normalize_type, CONTROLLED_VOCAB};

pub enum EvolutionAction {
    AddNew { reason: String },
    Evolved { old_id: uuid::Uuid, evolved_text: String, similarity: f32 },
}

pub struct ConsolidateCandidate {
    pub source_id: uuid::Uuid,
    pub duplicate_id: uuid::Uuid,
    pub score: f32,
}

pub struct ConsolidateReport {
    pub candidates: Vec<ConsolidateCandidate>,
    pub merged: usize,
}

pub struct RetractedItem {
    pub id: uuid::Uuid,
    pub preview: String,
    pub score: f32,
}

pub struct RetractReport {
    pub retracted: Vec<RetractedItem>,
    pub neo4j_cascade: Vec<String>,
}

pub struct DecayCandidate {
    pub id: uuid::Uuid,
    pub preview: String,
}

pub struct DecayReport {
    pub checked: usize,
    pub exempt: usize,
    pub candidates: Vec<DecayCandidate>,
    pub decayed: u64,
    pub dry_run: bool,
}

impl MemoryEngine {
    /// Decide whether `text` should evolve an existing memory (LLM-merged)
    /// or be added fresh.
    pub async fn check_evolution(&self, text: &str, user_id: &str) -> Result<EvolutionAction> {
        let hits = self.search(text, user_id, 5).await?;
        let best = hits.iter().find(|h| h.score > EVOLUTION_THRESHOLD);

        let Some(best) = best else {
            return Ok(EvolutionAction::AddNew {
                reason: "no similar memories above threshold".to_string(),
            });
        };

        if !self.llm.extraction_enabled() {
            return Ok(EvolutionAction::AddNew {
                reason: "no llm available to merge".to_string(),
            });
        }

        let prompt = format!(
            "Merge these two related memories into a single, updated memory that preserves \
             all important information. Return ONLY the merged text.\n\n\
             Old: {}\nNew: {text}",
            best.point.full_text
        );

        match self.llm.complete("", &prompt).await {
            Ok(evolved) if !evolved.trim().is_empty() => {
                let old_id = best.point.id;
                self.vector.delete(&old_id.to_string()).await?;
                let embedding = self.embeddings.embed(&evolved).await?;
                let point = MemoryPoint {
                    id: uuid::Uuid::new_v4(),
                    text_preview: MemoryPoint::preview_of(&evolved),
                    full_text: evolved.clone(),
                    content_hash: MemoryPoint::content_hash(&evolved),
                    user_id: user_id.to_string(),
                    agent_id: None,
                    source: "evolved".to_string(),
                    session_id: None,
                    confidence: best.point.confidence,
                    created_at: Utc::now(),
                    metadata: serde_json::json!({
                        "evolved_from": old_id.to_string(),
                        "evolution_timestamp": Utc::now().to_rfc3339(),
                    }),
                };
                self.vector.upsert(&point, &embedding).await?;

                let old_preview = best.point.text_preview.clone();
                let new_preview = point.text_preview.clone();
                let evolved_at = Utc::now();
                let graph = Arc::clone(&self.graph);
                tokio::spawn(async move {
                    if let Err(e) = graph
                        .create_evolution_link(&old_preview, &new_preview, evolved_at)
                        .await
                    {
                        tracing::warn!(error = %e, "evolution lineage edge failed");
                    }
                });

                Ok(EvolutionAction::Evolved {
                    old_id,
                    evolved_text: evolved,
                    similarity: best.score,
                })
            }
            _ => Ok(EvolutionAction::AddNew {
                reason: "evolution merge failed, falling back to add".to_string(),
            }),
        }
    }

    /// Record a retrieval-triggered access; returns the new access count.
    pub async fn reinforce(&self, memory_id: &str) -> Result<u64> {
        self.graph.record_access(memory_id).await
    }

    /// Increment decay_count (and accumulate `decay_amount` into each
    /// candidate's decay score) for memories not recently accessed.
    /// `days_inactive` only gates which memories count as stale via the
    /// `recently_accessed` exemption below; `dry_run` always computes the
    /// full candidate set but skips the mutating write.
    pub async fn decay(
        &self,
        user_id: &str,
        days_inactive: i64,
        decay_amount: f32,
        dry_run: bool,
    ) -> Result<DecayReport> {
        let _ = days_inactive;
        let entries = self.vector.list_all(user_id, 500).await?;
        let ids: Vec<String> = entries.iter().map(|e| e.id.to_string()).collect();

        let mut recently_accessed = Vec::new();
        for id in &ids {
            if let Ok(Some((accesses, _))) = self.graph.access_stats(id).await {
                if accesses > 0 {
                    recently_accessed.push(id.clone());
                }
            }
        }

        let candidates: Vec<DecayCandidate> = entries
            .iter()
            .filter(|e| !recently_accessed.contains(&e.id.to_string()))
            .take(10)
            .map(|e| DecayCandidate {
                id: e.id,
                preview: e.text_preview.clone(),
            })
            .collect();

        let decayed = if dry_run {
            0
        } else {
            self.graph
                .decay_memory_accesses(&ids, &recently_accessed, decay_amount)
                .await?
        };

        Ok(DecayReport {
            checked: ids.len(),
            exempt: recently_accessed.len(),
            candidates,
            decayed,
            dry_run,
        })
    }

    /// Find (and optionally merge) near-duplicate memories within a user's
    /// corpus, capped at 50 source memories per run to bound API calls.
    pub async fn consolidate(
        &self,
        user_id: &str,
        threshold: Option<f32>,
        dry_run: bool,
        limit: usize,
    ) -> Result<ConsolidateReport> {
        let threshold = threshold.unwrap_or(CONSOLIDATE_DEFAULT_THRESHOLD);
        let entries = self.vector.list_all(user_id, limit).await?;

        let mut checked = std::collections::HashSet::new();
        let mut candidates = Vec::new();

        for entry in entries.iter().take(50) {
            if !checked.insert(entry.id) {
                continue;
            }
            let Ok(hits) = self.search(&entry.full_text, user_id, 5).await else {
                continue;
            };
            for hit in hits {
                if hit.point.id == entry.id || checked.contains(&hit.point.id) {
                    continue;
                }
                if hit.score >= threshold {
                    candidates.push(ConsolidateCandidate {
                        source_id: entry.id,
                        duplicate_id: hit.point.id,
                        score: hit.score,
                    });
                }
            }
        }

        let mut merged = 0;
        if !dry_run {
            for candidate in &candidates {
                if self.vector.delete(&candidate.duplicate_id.to_string()).await.is_ok() {
                    merged += 1;
                }
            }
        }

        Ok(ConsolidateReport { candidates, merged })
    }

    /// Merge two memories directly — keeps `target`, deletes `source`.
    pub async fn merge_memories(&self, source_id: &str, _target_id: &str) -> Result<()> {
        self.vector.delete(source_id).await
    }

    /// Atomic retraction across the vector store and, optionally, cascading
    /// relationship removal in the graph. Every non-dry-run retraction is
    /// appended to a JSON-lines audit log.
    pub async fn retract(
        &self,
        query: &str,
        user_id: &str,
        cascade: bool,
        dry_run: bool,
        reason: &str,
    ) -> Result<RetractReport> {
        let hits = self.search(query, user_id, 20).await?;
        let to_retract: Vec<_> = hits
            .into_iter()
            .filter(|h| h.score > RETRACTION_SCORE_THRESHOLD)
            .collect();

        let mut neo4j_cascade = Vec::new();
        if cascade && self.graph.is_available().await {
            for item in &to_retract {
                let entities = extract_entities(&item.point.full_text, 5);
                for entity in entities {
                    if let Ok(rels) = self.graph.neighbors(&entity, 20).await {
                        neo4j_cascade.extend(rels.into_iter().map(|r| r.target));
                    }
                }
            }
        }

        let mut retracted = Vec::new();
        if !dry_run {
            for item in &to_retract {
                if self.vector.delete(&item.point.id.to_string()).await.is_ok() {
                    retracted.push(RetractedItem {
                        id: item.point.id,
                        preview: item.point.text_preview.clone(),
                        score: item.score,
                    });
                }
            }
        }

        if !dry_run && !retracted.is_empty() {
            self.append_retraction_log(query, user_id, reason, &retracted);
        }

        Ok(RetractReport { retracted, neo4j_cascade })
    }

    fn append_retraction_log(&self, query: &str, user_id: &str, reason: &str, retracted: &[RetractedItem]) {
        let path = retraction_log_path(self.config().aletheia_home.as_deref());
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, "retraction log: could not create directory");
                return;
            }
        }
        let file = std::fs::OpenOptions::new().create(true).append(true).open(&path);
        let mut file = match file {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "retraction log: could not open");
                return;
            }
        };
        for item in retracted {
            let line = serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "user_id": user_id,
                "query": query,
                "reason": reason,
                "memory_id": item.id,
                "preview": item.preview,
                "score": item.score,
            });
            if let Err(e) = writeln!(file, "{line}") {
                tracing::warn!(error = %e, "retraction log: write failed");
            }
        }
    }

    pub async fn merge_duplicate_entities(&self, canonical: &str, duplicate: &str) -> Result<()> {
        self.graph.merge_duplicate_entities(canonical, duplicate).await
    }

    pub async fn cleanup_orphan_entities(&self) -> Result<u64> {
        self.graph.cleanup_orphan_entities().await
    }

    /// Rewrites every relationship type present in the graph that falls
    /// outside the controlled vocabulary onto its normalized form. Returns
    /// the number of edges rewritten.
    pub async fn normalize_relationships(&self) -> Result<u64> {
        let present = self.graph.list_relationship_types().await?;
        let mut rewritten = 0u64;
        for rel_type in present {
            if CONTROLLED_VOCAB.contains(&rel_type.as_str()) {
                continue;
            }
            let canonical = normalize_type(&rel_type);
            rewritten += self
                .graph
                .rewrite_relationship_type(&rel_type, canonical)
                .await?;
        }
        Ok(rewritten)
    }
}

fn retraction_log_path(aletheia_home: Option<&str>) -> PathBuf {
    if let Some(home) = aletheia_home {
        return PathBuf::from(home).join("retractions.jsonl");
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".aletheia").join("retractions.jsonl"))
        .unwrap_or_else(|| PathBuf::from("retractions.jsonl"))
}
