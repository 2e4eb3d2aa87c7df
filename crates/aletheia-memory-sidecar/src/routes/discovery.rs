//! `/discovery/*` — C8 serendipitous discovery surface.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct DiscoverRequest {
    pub home_nodes: Vec<String>,
    #[serde(default = "default_novelty_weight")]
    pub novelty_weight: f64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_novelty_weight() -> f64 {
    0.5
}

fn default_max_results() -> usize {
    20
}

pub async fn discover(State(state): State<AppState>, Json(req): Json<DiscoverRequest>) -> ApiResult<Json<Value>> {
    if req.home_nodes.is_empty() {
        return Err(ApiError::bad_request("home_nodes must not be empty"));
    }
    let entities = state
        .engine
        .discover(&req.home_nodes, req.novelty_weight, req.max_results)
        .await?;
    let results: Vec<Value> = entities
        .into_iter()
        .map(|e| {
            json!({
                "entity": e.entity,
                "serendipity": e.serendipity,
                "relevance": e.relevance,
                "novelty": e.novelty,
                "community": e.community,
            })
        })
        .collect();
    Ok(Json(json!({ "ok": true, "results": results })))
}

#[derive(Deserialize)]
pub struct ExplorePathsRequest {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,
}

fn default_max_depth() -> usize {
    4
}

fn default_max_paths() -> usize {
    5
}

pub async fn explore_paths(
    State(state): State<AppState>,
    Json(req): Json<ExplorePathsRequest>,
) -> ApiResult<Json<Value>> {
    let result = state
        .engine
        .explore_paths(&req.source, req.target.as_deref(), req.max_depth, req.max_paths)
        .await?;
    let paths: Vec<Value> = result
        .paths
        .into_iter()
        .map(|p| {
            json!({
                "nodes": p.nodes,
                "relationship_count": p.relationship_count,
                "is_detour": p.is_detour,
                "communities_traversed": p.communities_traversed,
            })
        })
        .collect();
    Ok(Json(json!({
        "ok": true,
        "paths": paths,
        "ranked_nodes": result.ranked_nodes,
    })))
}

pub async fn generate_candidates(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let candidates = state.engine.generate_discovery_candidates().await?;
    Ok(Json(json!({ "ok": true, "candidates": candidates })))
}

pub async fn candidates(State(state): State<AppState>) -> Json<Value> {
    let candidates = state.engine.discovery_candidates().await;
    Json(json!({ "ok": true, "candidates": candidates }))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let report = state.engine.analyze_graph(false).await?;
    Ok(Json(json!({
        "ok": true,
        "node_count": report.node_count,
        "edge_count": report.edge_count,
        "community_count": report.communities.values().collect::<std::collections::HashSet<_>>().len(),
    })))
}
