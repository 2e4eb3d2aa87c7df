//! Property graph gateway over Neo4j (C3).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{Graph, Query};

use crate::error::{CoreError, Result};
use crate::model::{ForesightSignal, Relationship, TemporalFact};
use crate::storage::AvailabilityCache;
use crate::vocab::CONTROLLED_VOCAB;

/// Aggregate node/edge counts for `/graph_stats`.
#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub entities: u64,
    pub relationships: u64,
    pub temporal_facts: u64,
    pub episodes: u64,
}

/// Operations the rest of the crate needs from the property graph. A trait
/// boundary here lets retrieval/evolution/analytics be tested against a stub
/// without a live Neo4j instance.
#[async_trait]
pub trait GraphGateway: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn upsert_entity(&self, name: &str, labels: &[String]) -> Result<()>;

    async fn upsert_relationship(&self, rel: &Relationship) -> Result<()>;

    /// Rewire every controlled-vocabulary relationship type from `duplicate`
    /// onto `canonical`, then delete the duplicate node. Issues one
    /// parameterized statement per vocabulary type rather than assuming the
    /// APOC plugin is installed.
    async fn merge_duplicate_entities(&self, canonical: &str, duplicate: &str) -> Result<()>;

    /// Deletes entity nodes with no incident relationships. Returns the
    /// number removed.
    async fn cleanup_orphan_entities(&self) -> Result<u64>;

    async fn neighbors(&self, entity: &str, limit: usize) -> Result<Vec<Relationship>>;

    /// Case-insensitive substring match against every `Entity` name,
    /// shortest match first — the canonical name a shorthand or alias
    /// resolves to, if any. `None` if `name` itself is already the shortest
    /// match (nothing to resolve).
    async fn resolve_alias(&self, name: &str) -> Result<Option<String>>;

    async fn create_temporal_fact(&self, fact: &TemporalFact) -> Result<()>;

    async fn invalidate_fact(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64>;

    async fn facts_since(&self, since: DateTime<Utc>) -> Result<Vec<TemporalFact>>;

    async fn facts_at_time(
        &self,
        subject: &str,
        predicate: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TemporalFact>>;

    /// Full entity/relationship projection for in-memory analytics.
    async fn export_projection(&self) -> Result<(Vec<String>, Vec<Relationship>)>;

    /// Mark a memory as accessed, incrementing its access count. Returns the
    /// new count.
    async fn record_access(&self, memory_id: &str) -> Result<u64>;

    /// Fetch `(access_count, decay_count)` for a memory, if a
    /// `MemoryAccess` node exists for it.
    async fn access_stats(&self, memory_id: &str) -> Result<Option<(u64, u64)>>;

    /// Bulk-increment decay_count (and accumulate `decay_amount` into a
    /// running `decay_score`) for memories not present in `exempt`.
    async fn decay_memory_accesses(
        &self,
        memory_ids: &[String],
        exempt: &[String],
        decay_amount: f32,
    ) -> Result<u64>;

    /// Attach (or refresh) a `HAS_FORESIGHT` signal on an entity.
    async fn upsert_foresight(
        &self,
        entity: &str,
        signal: &str,
        activation: DateTime<Utc>,
        expiry: Option<DateTime<Utc>>,
        weight: f64,
    ) -> Result<()>;

    /// All foresight signals with weight above zero.
    async fn active_foresight(&self) -> Result<Vec<ForesightSignal>>;

    /// Decay past-expiry signals by `ForesightSignal::DECAY_STEP`, deleting
    /// any that reach weight <= 0. Returns the number touched.
    async fn decay_foresight(&self) -> Result<u64>;

    /// Coarse node/edge counts for `/graph_stats`.
    async fn graph_stats(&self) -> Result<GraphStats>;

    /// Distinct relationship types currently present in the graph.
    async fn list_relationship_types(&self) -> Result<Vec<String>>;

    /// Rewrite every edge of `from_type` to `to_type`, preserving properties.
    /// Returns the number of edges rewritten.
    async fn rewrite_relationship_type(&self, from_type: &str, to_type: &str) -> Result<u64>;

    /// Persist a graph analysis pass's pagerank/community scores back onto
    /// their `Entity` nodes, batched to bound statement size on large graphs.
    async fn store_projection_scores(
        &self,
        pagerank: &HashMap<String, f64>,
        communities: &HashMap<String, i64>,
    ) -> Result<()>;

    /// Record an LLM-described similarity link between two memories' text
    /// previews, surfaced by post-commit link generation.
    async fn create_link(&self, from_preview: &str, to_preview: &str, description: &str, score: f32) -> Result<()>;

    /// Record evolution lineage between an old memory and the merged memory
    /// that replaced it.
    async fn create_evolution_link(&self, old_preview: &str, new_preview: &str, evolved_at: DateTime<Utc>) -> Result<()>;
}

pub struct Neo4jGateway {
    graph: Graph,
    cache: AvailabilityCache,
}

impl Neo4jGateway {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| CoreError::Graph(format!("connect: {e}")))?;
        Ok(Self {
            graph,
            cache: AvailabilityCache::new(),
        })
    }

    async fn probe(&self) -> bool {
        let ok = self
            .graph
            .execute(Query::new("RETURN 1".to_string()))
            .await
            .is_ok();
        if ok {
            self.cache.mark_ok();
        } else {
            self.cache.mark_down();
        }
        ok
    }
}

#[async_trait]
impl GraphGateway for Neo4jGateway {
    async fn is_available(&self) -> bool {
        if let Some(cached) = self.cache.cached() {
            return cached;
        }
        self.probe().await
    }

    async fn upsert_entity(&self, name: &str, labels: &[String]) -> Result<()> {
        let label_clause = if labels.is_empty() {
            String::new()
        } else {
            format!(":{}", labels.join(":"))
        };
        let query = Query::new(format!(
            "MERGE (e:Entity{label_clause} {{name: $name}}) ON CREATE SET e.created_at = datetime()"
        ))
        .param("name", name);

        self.graph
            .run(query)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("upsert_entity: {e}"))
            })
    }

    async fn upsert_relationship(&self, rel: &Relationship) -> Result<()> {
        let query = Query::new(format!(
            "MATCH (a:Entity {{name: $source}}), (b:Entity {{name: $target}}) \
             MERGE (a)-[r:{} ]->(b) \
             SET r.confidence = $confidence, r.source_provenance = $provenance, \
                 r.created_at = $created_at",
            rel.rel_type
        ))
        .param("source", rel.source.as_str())
        .param("target", rel.target.as_str())
        .param("confidence", rel.confidence as f64)
        .param("provenance", rel.source_provenance.as_str())
        .param("created_at", rel.created_at.to_rfc3339());

        self.graph
            .run(query)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("upsert_relationship: {e}"))
            })
    }

    async fn merge_duplicate_entities(&self, canonical: &str, duplicate: &str) -> Result<()> {
        for rel_type in CONTROLLED_VOCAB {
            let outgoing = Query::new(format!(
                "MATCH (d:Entity {{name: $dup}})-[r:{rel_type}]->(other) \
                 MATCH (c:Entity {{name: $canon}}) \
                 MERGE (c)-[nr:{rel_type}]->(other) \
                 SET nr.confidence = r.confidence, nr.source_provenance = r.source_provenance \
                 DELETE r"
            ))
            .param("dup", duplicate)
            .param("canon", canonical);

            let incoming = Query::new(format!(
                "MATCH (other)-[r:{rel_type}]->(d:Entity {{name: $dup}}) \
                 MATCH (c:Entity {{name: $canon}}) \
                 MERGE (other)-[nr:{rel_type}]->(c) \
                 SET nr.confidence = r.confidence, nr.source_provenance = r.source_provenance \
                 DELETE r"
            ))
            .param("dup", duplicate)
            .param("canon", canonical);

            self.graph
                .run(outgoing)
                .await
                .map_err(|e| CoreError::Graph(format!("merge rewire outgoing {rel_type}: {e}")))?;
            self.graph
                .run(incoming)
                .await
                .map_err(|e| CoreError::Graph(format!("merge rewire incoming {rel_type}: {e}")))?;
        }

        let delete_dup =
            Query::new("MATCH (d:Entity {name: $dup}) DETACH DELETE d".to_string())
                .param("dup", duplicate);
        self.graph
            .run(delete_dup)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("merge_duplicate_entities delete: {e}"))
            })
    }

    async fn cleanup_orphan_entities(&self) -> Result<u64> {
        let query = Query::new(
            "MATCH (e:Entity) WHERE NOT (e)--() WITH e, count(e) AS c DETACH DELETE e RETURN c"
                .to_string(),
        );
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("cleanup_orphan_entities: {e}")))?;
        let mut removed = 0u64;
        while let Ok(Some(row)) = stream.next().await {
            removed += row.get::<i64>("c").unwrap_or(0) as u64;
        }
        self.cache.mark_ok();
        Ok(removed)
    }

    async fn neighbors(&self, entity: &str, limit: usize) -> Result<Vec<Relationship>> {
        let query = Query::new(
            "MATCH (a:Entity {name: $name})-[r]->(b:Entity) \
             RETURN a.name AS source, type(r) AS rel_type, b.name AS target, \
                    r.confidence AS confidence, r.source_provenance AS provenance, \
                    r.created_at AS created_at \
             LIMIT $limit"
                .to_string(),
        )
        .param("name", entity)
        .param("limit", limit as i64);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("neighbors: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let source: String = row.get("source").unwrap_or_default();
            let target: String = row.get("target").unwrap_or_default();
            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let confidence: f64 = row.get("confidence").unwrap_or(0.5);
            let provenance: String = row.get("provenance").unwrap_or_default();
            let created_at = row
                .get::<String>("created_at")
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);

            out.push(Relationship {
                source,
                target,
                rel_type,
                confidence: confidence as f32,
                source_provenance: provenance,
                created_at,
            });
        }
        self.cache.mark_ok();
        Ok(out)
    }

    async fn resolve_alias(&self, name: &str) -> Result<Option<String>> {
        let query = Query::new(
            "MATCH (n:Entity) WHERE toLower(n.name) CONTAINS toLower($name) \
             RETURN n.name AS canonical ORDER BY size(n.name) LIMIT 1"
                .to_string(),
        )
        .param("name", name);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("resolve_alias: {e}")))?;
        let canonical = if let Ok(Some(row)) = stream.next().await {
            row.get::<String>("canonical").ok()
        } else {
            None
        };
        self.cache.mark_ok();
        Ok(canonical.filter(|c| c != name))
    }

    async fn create_temporal_fact(&self, fact: &TemporalFact) -> Result<()> {
        // A fact is a TEMPORAL_FACT edge between the subject and object
        // entities, not a freestanding node — this keeps facts reachable
        // from neighbors()/graph-search the same way every other edge is.
        // Close whatever open fact already exists for this subject+predicate
        // before writing the new one, so at most one stays open at a time.
        let close_prior = Query::new(
            "MATCH (s:Entity {name: $subject})-[r:TEMPORAL_FACT]->(o) \
             WHERE r.predicate = $predicate AND r.valid_to IS NULL \
             SET r.valid_to = $valid_from, r.invalidation_reason = 'superseded'"
                .to_string(),
        )
        .param("subject", fact.subject.as_str())
        .param("predicate", fact.predicate.as_str())
        .param("valid_from", fact.valid_from.to_rfc3339());

        self.graph.run(close_prior).await.map_err(|e| {
            self.cache.mark_down();
            CoreError::Graph(format!("create_temporal_fact close prior: {e}"))
        })?;

        let create = Query::new(
            "MERGE (s:Entity {name: $subject}) \
             MERGE (o:Entity {name: $object}) \
             CREATE (s)-[:TEMPORAL_FACT {predicate: $predicate, valid_from: $valid_from, \
             valid_to: $valid_to, occurred_at: $occurred_at, recorded_at: $recorded_at, \
             confidence: $confidence, source_episode_id: $episode}]->(o)"
                .to_string(),
        )
        .param("subject", fact.subject.as_str())
        .param("predicate", fact.predicate.as_str())
        .param("object", fact.object.as_str())
        .param("valid_from", fact.valid_from.to_rfc3339())
        .param(
            "valid_to",
            fact.valid_to.map(|t| t.to_rfc3339()).unwrap_or_default(),
        )
        .param("occurred_at", fact.occurred_at.to_rfc3339())
        .param("recorded_at", fact.recorded_at.to_rfc3339())
        .param("confidence", fact.confidence as f64)
        .param("episode", fact.source_episode_id.clone().unwrap_or_default());

        self.graph
            .run(create)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("create_temporal_fact: {e}"))
            })
    }

    async fn invalidate_fact(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        at: DateTime<Utc>,
        reason: &str,
    ) -> Result<u64> {
        let query = Query::new(
            "MATCH (s:Entity {name: $subject})-[f:TEMPORAL_FACT {predicate: $predicate}]->(o:Entity {name: $object}) \
             WHERE f.valid_to IS NULL \
             SET f.valid_to = $at, f.invalidation_reason = $reason \
             RETURN count(f) AS n"
                .to_string(),
        )
        .param("subject", subject)
        .param("predicate", predicate)
        .param("object", object)
        .param("at", at.to_rfc3339())
        .param("reason", reason);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("invalidate_fact: {e}")))?;
        let n = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("n").unwrap_or(0) as u64
        } else {
            0
        };
        self.cache.mark_ok();
        Ok(n)
    }

    async fn facts_since(&self, since: DateTime<Utc>) -> Result<Vec<TemporalFact>> {
        let query = Query::new(
            "MATCH (s:Entity)-[f:TEMPORAL_FACT]->(o:Entity) \
             WHERE f.recorded_at >= $since \
             RETURN s.name AS subject, o.name AS object, f"
                .to_string(),
        )
        .param("since", since.to_rfc3339());
        self.run_facts_query(query).await
    }

    async fn facts_at_time(
        &self,
        subject: &str,
        predicate: &str,
        at: DateTime<Utc>,
    ) -> Result<Vec<TemporalFact>> {
        let query = Query::new(
            "MATCH (s:Entity {name: $subject})-[f:TEMPORAL_FACT {predicate: $predicate}]->(o:Entity) \
             WHERE f.valid_from <= $at AND (f.valid_to IS NULL OR f.valid_to > $at) \
             RETURN s.name AS subject, o.name AS object, f"
                .to_string(),
        )
        .param("subject", subject)
        .param("predicate", predicate)
        .param("at", at.to_rfc3339());
        self.run_facts_query(query).await
    }

    async fn export_projection(&self) -> Result<(Vec<String>, Vec<Relationship>)> {
        let names_query = Query::new("MATCH (e:Entity) RETURN e.name AS name".to_string());
        let mut names = Vec::new();
        let mut stream = self
            .graph
            .execute(names_query)
            .await
            .map_err(|e| CoreError::Graph(format!("export_projection entities: {e}")))?;
        while let Ok(Some(row)) = stream.next().await {
            names.push(row.get::<String>("name").unwrap_or_default());
        }

        let rels_query = Query::new(
            "MATCH (a:Entity)-[r]->(b:Entity) \
             RETURN a.name AS source, type(r) AS rel_type, b.name AS target, \
                    r.confidence AS confidence, r.source_provenance AS provenance, \
                    r.created_at AS created_at"
                .to_string(),
        );
        let mut rels = Vec::new();
        let mut stream = self
            .graph
            .execute(rels_query)
            .await
            .map_err(|e| CoreError::Graph(format!("export_projection rels: {e}")))?;
        while let Ok(Some(row)) = stream.next().await {
            let created_at = row
                .get::<String>("created_at")
                .ok()
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            rels.push(Relationship {
                source: row.get("source").unwrap_or_default(),
                target: row.get("target").unwrap_or_default(),
                rel_type: row.get("rel_type").unwrap_or_default(),
                confidence: row.get::<f64>("confidence").unwrap_or(0.5) as f32,
                source_provenance: row.get("provenance").unwrap_or_default(),
                created_at,
            });
        }
        self.cache.mark_ok();
        Ok((names, rels))
    }

    async fn record_access(&self, memory_id: &str) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let query = Query::new(
            "MERGE (m:MemoryAccess {memory_id: $id}) \
             ON CREATE SET m.access_count = 1, m.decay_count = 0, m.first_accessed = $now, m.last_accessed = $now \
             ON MATCH SET m.access_count = m.access_count + 1, m.last_accessed = $now \
             RETURN m.access_count AS count"
                .to_string(),
        )
        .param("id", memory_id)
        .param("now", now);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("record_access: {e}")))?;
        let count = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("count").unwrap_or(1) as u64
        } else {
            1
        };
        self.cache.mark_ok();
        Ok(count)
    }

    async fn access_stats(&self, memory_id: &str) -> Result<Option<(u64, u64)>> {
        let query = Query::new(
            "MATCH (m:MemoryAccess {memory_id: $id}) \
             RETURN m.access_count AS accesses, m.decay_count AS decays"
                .to_string(),
        )
        .param("id", memory_id);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("access_stats: {e}")))?;
        let stats = if let Ok(Some(row)) = stream.next().await {
            Some((
                row.get::<i64>("accesses").unwrap_or(0) as u64,
                row.get::<i64>("decays").unwrap_or(0) as u64,
            ))
        } else {
            None
        };
        self.cache.mark_ok();
        Ok(stats)
    }

    async fn decay_memory_accesses(
        &self,
        memory_ids: &[String],
        exempt: &[String],
        decay_amount: f32,
    ) -> Result<u64> {
        let candidates: Vec<&String> = memory_ids.iter().filter(|id| !exempt.contains(id)).collect();
        if candidates.is_empty() {
            return Ok(0);
        }
        let ids: Vec<String> = candidates.into_iter().cloned().collect();
        let now = Utc::now().to_rfc3339();
        let query = Query::new(
            "UNWIND $ids AS mid \
             MERGE (m:MemoryAccess {memory_id: mid}) \
             ON CREATE SET m.access_count = 0, m.decay_count = 1, \
                           m.decay_score = $amount, m.last_decayed = $now \
             ON MATCH SET m.decay_count = m.decay_count + 1, \
                          m.decay_score = coalesce(m.decay_score, 0.0) + $amount, \
                          m.last_decayed = $now \
             RETURN count(m) AS n"
                .to_string(),
        )
        .param("ids", ids)
        .param("amount", decay_amount as f64)
        .param("now", now);

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("decay_memory_accesses: {e}")))?;
        let n = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("n").unwrap_or(0) as u64
        } else {
            0
        };
        self.cache.mark_ok();
        Ok(n)
    }

    async fn upsert_foresight(
        &self,
        entity: &str,
        signal: &str,
        activation: DateTime<Utc>,
        expiry: Option<DateTime<Utc>>,
        weight: f64,
    ) -> Result<()> {
        let query = Query::new(
            "MERGE (e:Entity {name: $entity}) \
             MERGE (e)-[:HAS_FORESIGHT]->(f:ForesightSignal {signal: $signal}) \
             SET f.activation = $activation, f.expiry = $expiry, f.weight = $weight"
                .to_string(),
        )
        .param("entity", entity)
        .param("signal", signal)
        .param("activation", activation.to_rfc3339())
        .param("expiry", expiry.map(|e| e.to_rfc3339()).unwrap_or_default())
        .param("weight", weight);

        self.graph
            .run(query)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("upsert_foresight: {e}"))
            })
    }

    async fn active_foresight(&self) -> Result<Vec<ForesightSignal>> {
        let query = Query::new(
            "MATCH (e:Entity)-[:HAS_FORESIGHT]->(f:ForesightSignal) \
             WHERE f.weight > 0 \
             RETURN e.name AS entity, f.signal AS signal, f.activation AS activation, \
                    f.expiry AS expiry, f.weight AS weight"
                .to_string(),
        );
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("active_foresight: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let expiry = row
                .get::<String>("expiry")
                .ok()
                .filter(|s| !s.is_empty())
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            out.push(ForesightSignal {
                entity: row.get("entity").unwrap_or_default(),
                signal: row.get("signal").unwrap_or_default(),
                activation: parse_dt(row.get::<String>("activation").ok()),
                expiry,
                weight: row.get::<f64>("weight").unwrap_or(0.0),
            });
        }
        self.cache.mark_ok();
        Ok(out)
    }

    async fn decay_foresight(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        let decay_query = Query::new(format!(
            "MATCH (:Entity)-[:HAS_FORESIGHT]->(f:ForesightSignal) \
             WHERE f.expiry IS NOT NULL AND f.expiry <> '' AND f.expiry <= $now \
             SET f.weight = f.weight - {} \
             RETURN count(f) AS n",
            ForesightSignal::DECAY_STEP
        ))
        .param("now", now);

        let mut stream = self
            .graph
            .execute(decay_query)
            .await
            .map_err(|e| CoreError::Graph(format!("decay_foresight: {e}")))?;
        let touched = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("n").unwrap_or(0) as u64
        } else {
            0
        };

        let cleanup = Query::new(
            "MATCH (:Entity)-[r:HAS_FORESIGHT]->(f:ForesightSignal) WHERE f.weight <= 0 \
             DELETE r, f"
                .to_string(),
        );
        self.graph
            .run(cleanup)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("decay_foresight cleanup: {e}"))
            })?;
        Ok(touched)
    }

    async fn graph_stats(&self) -> Result<GraphStats> {
        let query = Query::new(
            "MATCH (e:Entity) WITH count(e) AS entities \
             MATCH ()-[r]->() WHERE type(r) NOT IN ['HAS_FORESIGHT', 'TEMPORAL_FACT'] \
             WITH entities, count(r) AS relationships \
             MATCH ()-[f:TEMPORAL_FACT]->() WITH entities, relationships, count(f) AS facts \
             MATCH (ep:Episode) RETURN entities, relationships, facts, count(ep) AS episodes"
                .to_string(),
        );
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("graph_stats: {e}")))?;
        let stats = if let Ok(Some(row)) = stream.next().await {
            GraphStats {
                entities: row.get::<i64>("entities").unwrap_or(0) as u64,
                relationships: row.get::<i64>("relationships").unwrap_or(0) as u64,
                temporal_facts: row.get::<i64>("facts").unwrap_or(0) as u64,
                episodes: row.get::<i64>("episodes").unwrap_or(0) as u64,
            }
        } else {
            GraphStats::default()
        };
        self.cache.mark_ok();
        Ok(stats)
    }

    async fn list_relationship_types(&self) -> Result<Vec<String>> {
        let query = Query::new("CALL db.relationshipTypes() YIELD relationshipType RETURN relationshipType".to_string());
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("list_relationship_types: {e}")))?;
        let mut out = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            out.push(row.get::<String>("relationshipType").unwrap_or_default());
        }
        self.cache.mark_ok();
        Ok(out)
    }

    async fn rewrite_relationship_type(&self, from_type: &str, to_type: &str) -> Result<u64> {
        if from_type == to_type {
            return Ok(0);
        }
        let query = Query::new(format!(
            "MATCH (a)-[r:{from_type}]->(b) \
             MERGE (a)-[nr:{to_type}]->(b) \
             SET nr.confidence = r.confidence, nr.source_provenance = r.source_provenance, \
                 nr.created_at = r.created_at \
             DELETE r \
             RETURN count(r) AS n"
        ));
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("rewrite_relationship_type: {e}")))?;
        let n = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("n").unwrap_or(0) as u64
        } else {
            0
        };
        self.cache.mark_ok();
        Ok(n)
    }

    async fn store_projection_scores(
        &self,
        pagerank: &HashMap<String, f64>,
        communities: &HashMap<String, i64>,
    ) -> Result<()> {
        let mut names: Vec<String> = pagerank.keys().cloned().collect();
        for name in communities.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        for batch in names.chunks(500) {
            let batch_names: Vec<String> = batch.to_vec();
            let batch_pageranks: Vec<f64> = batch_names
                .iter()
                .map(|n| pagerank.get(n).copied().unwrap_or(0.0))
                .collect();
            let batch_communities: Vec<i64> = batch_names
                .iter()
                .map(|n| communities.get(n).copied().unwrap_or(-1))
                .collect();

            let query = Query::new(
                "UNWIND range(0, size($names) - 1) AS i \
                 MATCH (e:Entity {name: $names[i]}) \
                 SET e.pagerank = $pageranks[i], e.community = $communities[i]"
                    .to_string(),
            )
            .param("names", batch_names)
            .param("pageranks", batch_pageranks)
            .param("communities", batch_communities);

            self.graph
                .run(query)
                .await
                .map_err(|e| CoreError::Graph(format!("store_projection_scores: {e}")))?;
        }
        self.cache.mark_ok();
        Ok(())
    }

    async fn create_link(&self, from_preview: &str, to_preview: &str, description: &str, score: f32) -> Result<()> {
        let query = Query::new(
            "MERGE (a:Memory {text_preview: $from}) \
             MERGE (b:Memory {text_preview: $to}) \
             CREATE (a)-[:LINKED {description: $description, score: $score, generated_at: datetime()}]->(b)"
                .to_string(),
        )
        .param("from", from_preview)
        .param("to", to_preview)
        .param("description", description)
        .param("score", score as f64);

        self.graph
            .run(query)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("create_link: {e}"))
            })
    }

    async fn create_evolution_link(
        &self,
        old_preview: &str,
        new_preview: &str,
        evolved_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = Query::new(
            "MERGE (old:Memory {text_preview: $old}) \
             MERGE (new:Memory {text_preview: $new}) \
             CREATE (old)-[:EVOLVED_INTO {evolved_at: $evolved_at}]->(new)"
                .to_string(),
        )
        .param("old", old_preview)
        .param("new", new_preview)
        .param("evolved_at", evolved_at.to_rfc3339());

        self.graph
            .run(query)
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Graph(format!("create_evolution_link: {e}"))
            })
    }
}

impl Neo4jGateway {
    async fn run_facts_query(&self, query: Query) -> Result<Vec<TemporalFact>> {
        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| CoreError::Graph(format!("facts query: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let rel: neo4rs::Relation = match row.get("f") {
                Ok(r) => r,
                Err(_) => continue,
            };
            let subject: String = row.get("subject").unwrap_or_default();
            let object: String = row.get("object").unwrap_or_default();

            let valid_to = rel
                .get::<String>("valid_to")
                .ok()
                .filter(|s| !s.is_empty())
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            out.push(TemporalFact {
                subject,
                predicate: rel.get("predicate").unwrap_or_default(),
                object,
                valid_from: parse_dt(rel.get::<String>("valid_from").ok()),
                valid_to,
                occurred_at: parse_dt(rel.get::<String>("occurred_at").ok()),
                recorded_at: parse_dt(rel.get::<String>("recorded_at").ok()),
                confidence: rel.get::<f64>("confidence").unwrap_or(0.5) as f32,
                source_episode_id: rel
                    .get::<String>("source_episode_id")
                    .ok()
                    .filter(|s| !s.is_empty()),
                invalidation_reason: rel
                    .get::<String>("invalidation_reason")
                    .ok()
                    .filter(|s| !s.is_empty()),
            });
        }
        self.cache.mark_ok();
        Ok(out)
    }
}

fn parse_dt(raw: Option<String>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}
