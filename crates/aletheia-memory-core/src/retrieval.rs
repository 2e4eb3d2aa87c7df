//! Retrieval engine (C5): plain vector search plus graph-aware variants.

use chrono::Utc;

use crate::config::{
    CONFIDENCE_ACCESS_BOOST_CAP, CONFIDENCE_ACCESS_BOOST_MIN_COUNT, CONFIDENCE_ACCESS_BOOST_PER,
    CONFIDENCE_DECAY_PENALTY_CAP, CONFIDENCE_DECAY_PENALTY_PER, GRAPH_ENHANCED_DEFAULT_WEIGHT,
    GRAPH_ENHANCED_MAX_ENTITIES, GRAPH_ENHANCED_MAX_NEIGHBOR_NAMES,
    GRAPH_ENHANCED_MAX_NEIGHBORS_PER_ENTITY, RECENCY_BOOST_B, RECENCY_WINDOW_HOURS,
    SEARCH_ENHANCED_MAX_ALIAS_ENTITIES, SEARCH_ENHANCED_MAX_QUERY_LEN,
    SEARCH_ENHANCED_MAX_VARIANTS, SEARCH_ENHANCED_MIN_QUERY_LEN,
};
use crate::engine::MemoryEngine;
use crate::entity::extract_entities;
use crate::error::Result;
use crate::model::MemoryPoint;
use crate::storage::ScoredMemory;

pub struct RetrievedMemory {
    pub point: MemoryPoint,
    pub score: f32,
    pub retrieval_source: &'static str,
}

pub struct GraphEnhancedResult {
    pub results: Vec<RetrievedMemory>,
    pub entities_extracted: Vec<String>,
    pub graph_neighbors: Vec<String>,
}

pub struct EnhancedSearchResult {
    pub results: Vec<RetrievedMemory>,
    pub query_variants: Vec<String>,
    pub aliases_resolved: Vec<(String, String)>,
}

impl MemoryEngine {
    /// Plain vector search with recency boost and graph-sourced confidence
    /// weighting layered on top, plus any hits surfaced through a
    /// graph-neighborhood expansion of the query (tagged `"graph"` so
    /// `graph_search` can filter down to just those).
    pub async fn search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<RetrievedMemory>> {
        let embedding = self.embeddings.embed(query).await?;
        let hits = self.vector.search(&embedding, limit, Some(user_id)).await?;

        let mut results: Vec<RetrievedMemory> = hits
            .into_iter()
            .map(|h| RetrievedMemory {
                score: h.score,
                point: h.point,
                retrieval_source: "vector",
            })
            .collect();

        let mut seen: std::collections::HashSet<_> = results.iter().map(|r| r.point.id).collect();
        for hit in self.graph_neighbor_hits(query, user_id, limit).await {
            if seen.insert(hit.point.id) {
                results.push(RetrievedMemory {
                    score: hit.score,
                    point: hit.point,
                    retrieval_source: "graph",
                });
            }
        }

        apply_recency_boost(&mut results);
        self.apply_confidence_weight(&mut results).await;
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    /// `search()`'s results restricted to ones surfaced via graph-neighborhood
    /// expansion rather than a direct vector hit on the query itself.
    pub async fn graph_search(&self, query: &str, user_id: &str, limit: usize) -> Result<Vec<RetrievedMemory>> {
        let results = self.search(query, user_id, limit).await?;
        Ok(results.into_iter().filter(|r| r.retrieval_source == "graph").collect())
    }

    /// Vector-searches the query expanded with neighbor names of entities
    /// mentioned in it. Shared by `search()` and `graph_enhanced_search()`,
    /// which tag the resulting hits differently.
    async fn graph_neighbor_hits(&self, query: &str, user_id: &str, limit: usize) -> Vec<ScoredMemory> {
        if !self.graph.is_available().await {
            return Vec::new();
        }
        let entities = extract_entities(query, GRAPH_ENHANCED_MAX_ENTITIES);
        if entities.is_empty() {
            return Vec::new();
        }

        let mut neighbors = Vec::new();
        for entity in entities.iter().take(GRAPH_ENHANCED_MAX_ENTITIES) {
            if let Ok(rels) = self.graph.neighbors(entity, GRAPH_ENHANCED_MAX_NEIGHBORS_PER_ENTITY).await {
                for rel in rels {
                    if !neighbors.contains(&rel.target) {
                        neighbors.push(rel.target);
                    }
                }
            }
        }
        if neighbors.is_empty() {
            return Vec::new();
        }

        let extra: Vec<&String> = neighbors.iter().take(GRAPH_ENHANCED_MAX_NEIGHBOR_NAMES).collect();
        let expanded = format!(
            "{query} {}",
            extra.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
        );
        let Ok(embedding) = self.embeddings.embed(&expanded).await else {
            return Vec::new();
        };
        self.vector.search(&embedding, limit, Some(user_id)).await.unwrap_or_default()
    }

    /// Vector search enhanced with a graph-neighborhood expansion pass: the
    /// query's entities are traversed, and neighbor names feed a second,
    /// weighted vector search whose results are merged with the first.
    pub async fn graph_enhanced_search(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        graph_weight: Option<f32>,
    ) -> Result<GraphEnhancedResult> {
        let graph_weight = graph_weight.unwrap_or(GRAPH_ENHANCED_DEFAULT_WEIGHT);
        let vector_weight = 1.0 - graph_weight;

        let embedding = self.embeddings.embed(query).await?;
        let vector_hits = self
            .vector
            .search(&embedding, limit * 2, Some(user_id))
            .await
            .unwrap_or_default();

        let entities = extract_entities(query, GRAPH_ENHANCED_MAX_ENTITIES);
        let mut graph_neighbors = Vec::new();
        if !entities.is_empty() && self.graph.is_available().await {
            for entity in entities.iter().take(GRAPH_ENHANCED_MAX_ENTITIES) {
                if let Ok(rels) = self.graph.neighbors(entity, 10).await {
                    for rel in rels {
                        if !graph_neighbors.contains(&rel.target) {
                            graph_neighbors.push(rel.target);
                        }
                    }
                }
            }
        }

        let mut graph_hits: Vec<ScoredMemory> = Vec::new();
        if !graph_neighbors.is_empty() {
            let extra: Vec<&String> = graph_neighbors
                .iter()
                .take(GRAPH_ENHANCED_MAX_NEIGHBOR_NAMES)
                .collect();
            let expanded = format!(
                "{query} {}",
                extra.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" ")
            );
            if let Ok(expanded_embedding) = self.embeddings.embed(&expanded).await {
                graph_hits = self
                    .vector
                    .search(&expanded_embedding, limit * 2, Some(user_id))
                    .await
                    .unwrap_or_default();
            }
        }

        let mut seen = std::collections::HashSet::new();
        let mut merged = Vec::new();
        for hit in vector_hits {
            if seen.insert(hit.point.id) {
                merged.push(RetrievedMemory {
                    score: hit.score * vector_weight,
                    point: hit.point,
                    retrieval_source: "vector",
                });
            }
        }
        for hit in graph_hits {
            if seen.insert(hit.point.id) {
                merged.push(RetrievedMemory {
                    score: hit.score * graph_weight,
                    point: hit.point,
                    retrieval_source: "graph_expanded",
                });
            }
        }

        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(limit);

        Ok(GraphEnhancedResult {
            results: merged,
            entities_extracted: entities,
            graph_neighbors,
        })
    }

    /// Entity-alias resolution plus LLM-generated query variants, run in
    /// parallel against the vector store and merged.
    pub async fn search_enhanced(
        &self,
        query: &str,
        user_id: &str,
        limit: usize,
        rewrite: bool,
    ) -> Result<EnhancedSearchResult> {
        if !rewrite
            || query.len() < SEARCH_ENHANCED_MIN_QUERY_LEN
            || query.len() > SEARCH_ENHANCED_MAX_QUERY_LEN
        {
            let results = self.search(query, user_id, limit).await?;
            return Ok(EnhancedSearchResult {
                results,
                query_variants: vec![query.to_string()],
                aliases_resolved: Vec::new(),
            });
        }

        let entities = extract_entities(query, SEARCH_ENHANCED_MAX_ALIAS_ENTITIES);
        let mut aliases_resolved = Vec::new();
        let mut resolved_query = query.to_string();

        if !entities.is_empty() && self.graph.is_available().await {
            for entity in entities.iter().take(SEARCH_ENHANCED_MAX_ALIAS_ENTITIES) {
                if let Ok(Some(canonical)) = self.graph.resolve_alias(entity).await {
                    resolved_query = resolved_query.replace(entity.as_str(), &canonical);
                    aliases_resolved.push((entity.clone(), canonical));
                }
            }
        }

        let mut variants = vec![query.to_string()];
        if resolved_query != query {
            variants.push(resolved_query);
        }

        if self.llm.extraction_enabled() {
            let prompt = format!(
                "Rewrite this search query 2 different ways to find the same information. \
                 Return ONLY the 2 variants, one per line, no numbering.\n\nQuery: \"{query}\""
            );
            if let Ok(text) = self.llm.complete("", &prompt).await {
                for line in text.lines() {
                    let cleaned = line.trim().trim_matches('"').trim_start_matches("- ").trim();
                    if cleaned.len() > 5 && cleaned != query && variants.len() < SEARCH_ENHANCED_MAX_VARIANTS {
                        variants.push(cleaned.to_string());
                    }
                }
            }
        }
        variants.truncate(SEARCH_ENHANCED_MAX_VARIANTS);

        let mut seen = std::collections::HashSet::new();
        let mut merged = Vec::new();
        for variant in &variants {
            if let Ok(hits) = self.search(variant, user_id, limit).await {
                for hit in hits {
                    if seen.insert(hit.point.id) {
                        merged.push(hit);
                    }
                }
            }
        }
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(limit);

        Ok(EnhancedSearchResult {
            results: merged,
            query_variants: variants,
            aliases_resolved,
        })
    }

    async fn apply_confidence_weight(&self, results: &mut [RetrievedMemory]) {
        if !self.graph.is_available().await || results.is_empty() {
            return;
        }
        for r in results.iter_mut() {
            let Ok(Some((accesses, decays))) = self.graph.access_stats(&r.point.id.to_string()).await else {
                continue;
            };
            if decays > 0 && accesses == 0 {
                let penalty = (decays as f32 * CONFIDENCE_DECAY_PENALTY_PER).min(CONFIDENCE_DECAY_PENALTY_CAP);
                r.score = (r.score - penalty).max(0.0);
            } else if accesses > CONFIDENCE_ACCESS_BOOST_MIN_COUNT {
                let boost = (accesses as f32 * CONFIDENCE_ACCESS_BOOST_PER).min(CONFIDENCE_ACCESS_BOOST_CAP);
                r.score += boost;
            }
        }
    }
}

fn apply_recency_boost(results: &mut [RetrievedMemory]) {
    let now = Utc::now();
    for r in results.iter_mut() {
        let age_hours = (now - r.point.created_at).num_seconds() as f32 / 3600.0;
        if age_hours >= 0.0 && age_hours < RECENCY_WINDOW_HOURS {
            let boost = RECENCY_BOOST_B * (1.0 - age_hours / RECENCY_WINDOW_HOURS);
            r.score += boost;
        }
    }
}
