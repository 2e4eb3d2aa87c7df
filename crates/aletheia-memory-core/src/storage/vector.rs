//! Vector index gateway over Qdrant (C3, optional `qdrant` feature).

use async_trait::async_trait;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, QueryPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};

use crate::error::{CoreError, Result};
use crate::model::MemoryPoint;
use crate::storage::AvailabilityCache;

const COLLECTION: &str = "aletheia_memories";
const EMBEDDING_DIM: u64 = 1024;

pub struct ScoredMemory {
    pub point: MemoryPoint,
    pub score: f32,
}

#[async_trait]
pub trait VectorGateway: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn ensure_collection(&self) -> Result<()>;

    async fn upsert(&self, point: &MemoryPoint, embedding: &[f32]) -> Result<()>;

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        user_id: Option<&str>,
    ) -> Result<Vec<ScoredMemory>>;

    async fn delete(&self, id: &str) -> Result<()>;

    async fn list_all(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryPoint>>;
}

pub struct QdrantGateway {
    client: Qdrant,
    cache: AvailabilityCache,
}

impl QdrantGateway {
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let url = format!("http://{host}:{port}");
        let client = Qdrant::from_url(&url)
            .build()
            .map_err(|e| CoreError::Vector(format!("connect: {e}")))?;
        Ok(Self {
            client,
            cache: AvailabilityCache::new(),
        })
    }

    fn point_to_payload(point: &MemoryPoint) -> Payload {
        let mut payload = Payload::new();
        payload.insert("text_preview", point.text_preview.clone());
        payload.insert("full_text", point.full_text.clone());
        payload.insert("content_hash", point.content_hash.clone());
        payload.insert("user_id", point.user_id.clone());
        payload.insert(
            "agent_id",
            point.agent_id.clone().unwrap_or_default(),
        );
        payload.insert("source", point.source.clone());
        payload.insert("session_id", point.session_id.clone().unwrap_or_default());
        payload.insert("confidence", point.confidence as f64);
        payload.insert("created_at", point.created_at.to_rfc3339());
        payload
    }

    fn payload_to_point(id: &str, payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>) -> Option<MemoryPoint> {
        let get_str = |k: &str| -> String {
            payload
                .get(k)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        let created_at = chrono::DateTime::parse_from_rfc3339(&get_str("created_at"))
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        let confidence = payload
            .get("confidence")
            .and_then(|v| v.as_double())
            .unwrap_or(0.5) as f32;
        let agent_id_raw = get_str("agent_id");

        Some(MemoryPoint {
            id: uuid::Uuid::parse_str(id).ok()?,
            text_preview: get_str("text_preview"),
            full_text: get_str("full_text"),
            content_hash: get_str("content_hash"),
            user_id: get_str("user_id"),
            agent_id: (!agent_id_raw.is_empty()).then_some(agent_id_raw),
            source: get_str("source"),
            session_id: {
                let s = get_str("session_id");
                (!s.is_empty()).then_some(s)
            },
            confidence,
            created_at,
            metadata: serde_json::Value::Null,
        })
    }
}

#[async_trait]
impl VectorGateway for QdrantGateway {
    async fn is_available(&self) -> bool {
        if let Some(cached) = self.cache.cached() {
            return cached;
        }
        let ok = self.client.health_check().await.is_ok();
        if ok {
            self.cache.mark_ok();
        } else {
            self.cache.mark_down();
        }
        ok
    }

    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(COLLECTION)
            .await
            .map_err(|e| CoreError::Vector(format!("collection_exists: {e}")))?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(COLLECTION)
                    .vectors_config(VectorParamsBuilder::new(EMBEDDING_DIM, Distance::Cosine)),
            )
            .await
            .map(|_| ())
            .map_err(|e| CoreError::Vector(format!("create_collection: {e}")))
    }

    async fn upsert(&self, point: &MemoryPoint, embedding: &[f32]) -> Result<()> {
        let payload = Self::point_to_payload(point);
        let struct_point =
            PointStruct::new(point.id.to_string(), embedding.to_vec(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(COLLECTION, vec![struct_point]))
            .await
            .map(|_| self.cache.mark_ok())
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Vector(format!("upsert: {e}"))
            })
    }

    async fn search(
        &self,
        embedding: &[f32],
        limit: usize,
        user_id: Option<&str>,
    ) -> Result<Vec<ScoredMemory>> {
        let mut builder = QueryPointsBuilder::new(COLLECTION)
            .query(embedding.to_vec())
            .limit(limit as u64)
            .with_payload(true);

        if let Some(user_id) = user_id {
            builder = builder.filter(qdrant_client::qdrant::Filter::must([
                qdrant_client::qdrant::Condition::matches("user_id", user_id.to_string()),
            ]));
        }

        let result = self
            .client
            .query(builder)
            .await
            .map(|r| {
                self.cache.mark_ok();
                r
            })
            .map_err(|e| {
                self.cache.mark_down();
                CoreError::Vector(format!("search: {e}"))
            })?;

        let mut out = Vec::new();
        for scored in result.result {
            let id = match &scored.id {
                Some(id) => match &id.point_id_options {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s.clone(),
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
                    None => continue,
                },
                None => continue,
            };
            let payload: std::collections::HashMap<_, _> = scored.payload.into_iter().collect();
            if let Some(point) = Self::payload_to_point(&id, &payload) {
                out.push(ScoredMemory {
                    point,
                    score: scored.score,
                });
            }
        }
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_points(
                qdrant_client::qdrant::DeletePointsBuilder::new(COLLECTION).points(
                    qdrant_client::qdrant::PointsIdsList {
                        ids: vec![id.into()],
                    },
                ),
            )
            .await
            .map(|_| ())
            .map_err(|e| CoreError::Vector(format!("delete: {e}")))
    }

    async fn list_all(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryPoint>> {
        let filter = qdrant_client::qdrant::Filter::must([
            qdrant_client::qdrant::Condition::matches("user_id", user_id.to_string()),
        ]);
        let response = self
            .client
            .scroll(
                qdrant_client::qdrant::ScrollPointsBuilder::new(COLLECTION)
                    .filter(filter)
                    .limit(limit as u32)
                    .with_payload(true),
            )
            .await
            .map_err(|e| CoreError::Vector(format!("list_all: {e}")))?;

        let mut out = Vec::new();
        for point in response.result {
            let id = match &point.id {
                Some(id) => match &id.point_id_options {
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s.clone(),
                    Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
                    None => continue,
                },
                None => continue,
            };
            let payload: std::collections::HashMap<_, _> = point.payload.into_iter().collect();
            if let Some(mp) = Self::payload_to_point(&id, &payload) {
                out.push(mp);
            }
        }
        Ok(out)
    }
}
