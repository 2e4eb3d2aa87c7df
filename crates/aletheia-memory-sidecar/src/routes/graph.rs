//! `/graph_stats`, `/graph/*`, `/normalize_relationships` — raw graph surface.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub store_scores: bool,
}

pub async fn graph_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.engine.graph_stats().await?;
    Ok(Json(json!({
        "ok": true,
        "entities": stats.entities,
        "relationships": stats.relationships,
        "temporal_facts": stats.temporal_facts,
        "episodes": stats.episodes,
    })))
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<Json<Value>> {
    let report = state.engine.analyze_graph(req.store_scores).await?;
    let dedup_candidates: Vec<Value> = report
        .dedup_candidates
        .iter()
        .map(|c| json!({"entity_a": c.entity_a, "entity_b": c.entity_b, "jaccard": c.jaccard}))
        .collect();
    Ok(Json(json!({
        "ok": true,
        "node_count": report.node_count,
        "edge_count": report.edge_count,
        "pagerank": report.pagerank,
        "communities": report.communities,
        "dedup_candidates": dedup_candidates,
        "scores_stored": report.scores_stored,
    })))
}

pub async fn export(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let projection = state.engine.load_projection().await?;
    let nodes = projection.node_names();
    let edges: Vec<Value> = nodes
        .iter()
        .flat_map(|n| {
            projection
                .neighbors_of(n)
                .into_iter()
                .map(move |neighbor| json!({"source": n, "target": neighbor}))
        })
        .collect();
    Ok(Json(json!({ "ok": true, "nodes": nodes, "edges": edges })))
}

pub async fn normalize_relationships(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rewritten = state.engine.normalize_relationships().await?;
    Ok(Json(json!({ "ok": true, "rewritten": rewritten })))
}
