//! `/temporal/*` — C6 bi-temporal episode and fact surface.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateEpisodeRequest {
    pub content: String,
    pub agent_id: String,
    pub session_id: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn default_source() -> String {
    "api".to_string()
}

pub async fn create_episode(
    State(state): State<AppState>,
    Json(req): Json<CreateEpisodeRequest>,
) -> ApiResult<Json<Value>> {
    let episode = state
        .engine
        .create_episode(&req.content, &req.agent_id, &req.session_id, &req.source, req.occurred_at)
        .await?;
    Ok(Json(json!({ "ok": true, "episode": episode })))
}

#[derive(Deserialize)]
pub struct ListEpisodesParams {
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}

/// Episodes are read back through the changelog facts API — there is no
/// dedicated episode listing query on the graph gateway, so this reuses
/// `facts_since` scoped to the epoch when `since` is omitted.
pub async fn list_episodes(
    State(state): State<AppState>,
    Query(params): Query<ListEpisodesParams>,
) -> ApiResult<Json<Value>> {
    let since = params.since.unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap());
    let facts = state.engine.query_since(since).await?;
    Ok(Json(json!({ "ok": true, "facts": facts })))
}

#[derive(Deserialize)]
pub struct CreateFactRequest {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub source_episode_id: Option<String>,
}

fn default_confidence() -> f32 {
    0.8
}

pub async fn create_fact(State(state): State<AppState>, Json(req): Json<CreateFactRequest>) -> ApiResult<Json<Value>> {
    let fact = state
        .engine
        .create_fact(
            &req.subject,
            &req.predicate,
            &req.object,
            req.occurred_at,
            req.confidence,
            req.source_episode_id,
        )
        .await?;
    Ok(Json(json!({ "ok": true, "fact": fact })))
}

#[derive(Deserialize)]
pub struct InvalidateFactRequest {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub reason: String,
}

pub async fn invalidate_fact(
    State(state): State<AppState>,
    Json(req): Json<InvalidateFactRequest>,
) -> ApiResult<Json<Value>> {
    let n = state
        .engine
        .invalidate_fact(&req.subject, &req.predicate, &req.object, &req.reason)
        .await?;
    Ok(Json(json!({ "ok": true, "invalidated": n })))
}

#[derive(Deserialize)]
pub struct SinceRequest {
    pub since: DateTime<Utc>,
}

pub async fn since(State(state): State<AppState>, Json(req): Json<SinceRequest>) -> ApiResult<Json<Value>> {
    let facts = state.engine.query_since(req.since).await?;
    Ok(Json(json!({ "ok": true, "facts": facts })))
}

pub async fn what_changed(State(state): State<AppState>, Json(req): Json<SinceRequest>) -> ApiResult<Json<Value>> {
    let changed = state.engine.what_changed(req.since).await?;
    Ok(Json(json!({
        "ok": true,
        "invalidated": changed.invalidated,
        "created": changed.created,
    })))
}

#[derive(Deserialize)]
pub struct AtTimeRequest {
    pub subject: String,
    pub predicate: String,
    pub at: DateTime<Utc>,
}

pub async fn at_time(State(state): State<AppState>, Json(req): Json<AtTimeRequest>) -> ApiResult<Json<Value>> {
    let facts = state.engine.at_time(&req.subject, &req.predicate, req.at).await?;
    Ok(Json(json!({ "ok": true, "facts": facts })))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.engine.graph_stats().await?;
    Ok(Json(json!({
        "ok": true,
        "temporal_facts": stats.temporal_facts,
        "episodes": stats.episodes,
    })))
}
