//! `/retract`, `/consolidate`, `/merge`, `/evolution/*`, `/fact_stats` — C7 surface.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use aletheia_memory_core::config::{DECAY_DEFAULT_AMOUNT, DECAY_DEFAULT_DAYS_INACTIVE};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RetractRequest {
    pub query: String,
    pub user_id: String,
    #[serde(default)]
    pub cascade: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "unspecified".to_string()
}

pub async fn retract(State(state): State<AppState>, Json(req): Json<RetractRequest>) -> ApiResult<Json<Value>> {
    let report = state
        .engine
        .retract(&req.query, &req.user_id, req.cascade, req.dry_run, &req.reason)
        .await?;
    let retracted: Vec<Value> = report
        .retracted
        .into_iter()
        .map(|r| json!({"id": r.id, "preview": r.preview, "score": r.score}))
        .collect();
    Ok(Json(json!({
        "ok": true,
        "retracted": retracted,
        "neo4j_cascade": report.neo4j_cascade,
    })))
}

#[derive(Deserialize)]
pub struct ConsolidateRequest {
    pub user_id: String,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    200
}

pub async fn consolidate(
    State(state): State<AppState>,
    Json(req): Json<ConsolidateRequest>,
) -> ApiResult<Json<Value>> {
    let report = state
        .engine
        .consolidate(&req.user_id, req.threshold, req.dry_run, req.limit)
        .await?;
    let candidates: Vec<Value> = report
        .candidates
        .iter()
        .map(|c| json!({"source_id": c.source_id, "duplicate_id": c.duplicate_id, "score": c.score}))
        .collect();
    Ok(Json(json!({ "ok": true, "candidates": candidates, "merged": report.merged })))
}

#[derive(Deserialize)]
pub struct MergeRequest {
    pub source_id: String,
    pub target_id: String,
}

pub async fn merge(State(state): State<AppState>, Json(req): Json<MergeRequest>) -> ApiResult<Json<Value>> {
    state.engine.merge_memories(&req.source_id, &req.target_id).await?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn fact_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.engine.graph_stats().await?;
    Ok(Json(json!({ "ok": true, "temporal_facts": stats.temporal_facts })))
}

#[derive(Deserialize)]
pub struct CheckRequest {
    pub text: String,
    pub user_id: String,
}

pub async fn check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> ApiResult<Json<Value>> {
    let action = state.engine.check_evolution(&req.text, &req.user_id).await?;
    Ok(Json(match action {
        aletheia_memory_core::evolution::EvolutionAction::AddNew { reason } => {
            json!({ "ok": true, "action": "add_new", "reason": reason })
        }
        aletheia_memory_core::evolution::EvolutionAction::Evolved { old_id, evolved_text, similarity } => {
            json!({
                "ok": true,
                "action": "evolved",
                "old_id": old_id,
                "evolved_text": evolved_text,
                "similarity": similarity,
            })
        }
    }))
}

#[derive(Deserialize)]
pub struct ReinforceRequest {
    pub memory_id: String,
}

pub async fn reinforce(State(state): State<AppState>, Json(req): Json<ReinforceRequest>) -> ApiResult<Json<Value>> {
    let count = state.engine.reinforce(&req.memory_id).await?;
    Ok(Json(json!({ "ok": true, "access_count": count })))
}

#[derive(Deserialize)]
pub struct DecayRequest {
    pub user_id: String,
    #[serde(default = "default_days_inactive")]
    pub days_inactive: i64,
    #[serde(default = "default_decay_amount")]
    pub decay_amount: f32,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_days_inactive() -> i64 {
    DECAY_DEFAULT_DAYS_INACTIVE
}

fn default_decay_amount() -> f32 {
    DECAY_DEFAULT_AMOUNT
}

pub async fn decay(State(state): State<AppState>, Json(req): Json<DecayRequest>) -> ApiResult<Json<Value>> {
    let report = state
        .engine
        .decay(&req.user_id, req.days_inactive, req.decay_amount, req.dry_run)
        .await?;
    let sample: Vec<Value> = report
        .candidates
        .iter()
        .map(|c| json!({"id": c.id, "preview": c.preview}))
        .collect();
    Ok(Json(json!({
        "ok": true,
        "checked": report.checked,
        "exempt": report.exempt,
        "decayed": report.decayed,
        "dry_run": report.dry_run,
        "sample": sample,
    })))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.engine.graph_stats().await?;
    Ok(Json(json!({
        "ok": true,
        "entities": stats.entities,
        "relationships": stats.relationships,
    })))
}
