//! `/add*`, `/memories*`, `/import` — C4 ingestion surface.

use aletheia_memory_core::ingest::ExtractedFact;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddRequest {
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
}

pub async fn add(State(state): State<AppState>, Json(req): Json<AddRequest>) -> ApiResult<Json<Value>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    let outcome = state
        .engine
        .add(&req.text, &req.user_id, req.agent_id.as_deref(), req.metadata)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "id": outcome.id,
        "deduplicated": outcome.deduplicated,
        "existing_id": outcome.existing_id,
        "graph_degraded": outcome.graph_degraded,
        "tier3_embed_only": outcome.tier3_embed_only,
    })))
}

#[derive(Deserialize)]
pub struct AddDirectRequest {
    pub text: String,
    pub user_id: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_confidence() -> f32 {
    0.9
}

pub async fn add_direct(
    State(state): State<AppState>,
    Json(req): Json<AddDirectRequest>,
) -> ApiResult<Json<Value>> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    let outcome = state.engine.add_direct(&req.text, &req.user_id, req.confidence).await?;
    Ok(Json(json!({
        "ok": true,
        "id": outcome.id,
        "deduplicated": outcome.deduplicated,
    })))
}

#[derive(Deserialize)]
pub struct AddBatchRequest {
    pub texts: Vec<String>,
    pub user_id: String,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

pub async fn add_batch(
    State(state): State<AppState>,
    Json(req): Json<AddBatchRequest>,
) -> ApiResult<Json<Value>> {
    if req.texts.is_empty() {
        return Err(ApiError::bad_request("texts must not be empty"));
    }
    let results = state.engine.add_batch(&req.texts, &req.user_id, req.confidence).await?;
    let items: Vec<Value> = results
        .into_iter()
        .map(|r| match r {
            Ok(o) => json!({"ok": true, "id": o.id, "deduplicated": o.deduplicated}),
            Err(e) => json!({"ok": false, "error": e.to_string()}),
        })
        .collect();
    Ok(Json(json!({ "ok": true, "results": items })))
}

#[derive(Deserialize)]
pub struct ImportFact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default = "default_import_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

fn default_import_confidence() -> f32 {
    0.9
}

#[derive(Deserialize)]
pub struct ImportRequest {
    pub user_id: String,
    pub facts: Vec<ImportFact>,
}

pub async fn import(State(state): State<AppState>, Json(req): Json<ImportRequest>) -> ApiResult<Json<Value>> {
    let facts: Vec<ExtractedFact> = req
        .facts
        .into_iter()
        .map(|f| ExtractedFact {
            subject: f.subject,
            predicate: f.predicate,
            object: f.object,
            confidence: f.confidence,
            domain: f.domain,
            agent: f.agent,
        })
        .collect();
    let written = state.engine.import_facts(&facts, &req.user_id).await?;
    Ok(Json(json!({ "ok": true, "written": written })))
}

#[derive(Deserialize)]
pub struct ListMemoriesParams {
    pub user_id: String,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

fn default_list_limit() -> usize {
    100
}

pub async fn list_memories(
    State(state): State<AppState>,
    Query(params): Query<ListMemoriesParams>,
) -> ApiResult<Json<Value>> {
    let points = state.engine.list_memories(&params.user_id, params.limit).await?;
    Ok(Json(json!({ "ok": true, "memories": points })))
}

pub async fn delete_memory(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.engine.delete_memory(&id).await?;
    Ok(Json(json!({ "ok": true, "id": id })))
}
