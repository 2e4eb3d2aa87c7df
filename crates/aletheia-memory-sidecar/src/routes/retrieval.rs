//! `/search*`, `/graph_search`, `/graph_enhanced_search` — C5 retrieval surface.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

fn default_limit() -> usize {
    10
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> ApiResult<Json<Value>> {
    let hits = state.engine.search(&req.query, &req.user_id, req.limit).await?;
    Ok(Json(json!({ "ok": true, "results": to_json(hits) })))
}

#[derive(Deserialize)]
pub struct SearchEnhancedRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub rewrite: bool,
}

pub async fn search_enhanced(
    State(state): State<AppState>,
    Json(req): Json<SearchEnhancedRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .engine
        .search_enhanced(&req.query, &req.user_id, req.limit, req.rewrite)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "results": to_json(result.results),
        "query_variants": result.query_variants,
        "aliases_resolved": result.aliases_resolved,
    })))
}

#[derive(Deserialize)]
pub struct GraphSearchRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn graph_search(
    State(state): State<AppState>,
    Json(req): Json<GraphSearchRequest>,
) -> ApiResult<Json<Value>> {
    let results = state.engine.graph_search(&req.query, &req.user_id, req.limit).await?;
    Ok(Json(json!({ "ok": true, "results": to_json(results) })))
}

#[derive(Deserialize)]
pub struct GraphEnhancedSearchRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub graph_weight: Option<f32>,
}

pub async fn graph_enhanced_search(
    State(state): State<AppState>,
    Json(req): Json<GraphEnhancedSearchRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .engine
        .graph_enhanced_search(&req.query, &req.user_id, req.limit, req.graph_weight)
        .await?;
    Ok(Json(json!({
        "ok": true,
        "results": to_json(result.results),
        "entities_extracted": result.entities_extracted,
        "graph_neighbors": result.graph_neighbors,
    })))
}

fn to_json(hits: Vec<aletheia_memory_core::retrieval::RetrievedMemory>) -> Vec<Value> {
    hits.into_iter()
        .map(|h| {
            json!({
                "point": h.point,
                "score": h.score,
                "retrieval_source": h.retrieval_source,
            })
        })
        .collect()
}
