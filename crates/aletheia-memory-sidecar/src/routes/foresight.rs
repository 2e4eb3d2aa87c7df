//! `/foresight/*` — anticipatory signals fed by the attention daemon.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddForesightRequest {
    pub entity: String,
    pub signal: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

pub async fn add(State(state): State<AppState>, Json(req): Json<AddForesightRequest>) -> ApiResult<Json<Value>> {
    let signal = state
        .engine
        .add_foresight(&req.entity, &req.signal, req.expiry, req.weight)
        .await?;
    Ok(Json(json!({ "ok": true, "signal": signal })))
}

pub async fn active(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let signals = state.engine.active_foresight().await?;
    Ok(Json(json!({ "ok": true, "signals": signals })))
}

pub async fn decay(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let touched = state.engine.decay_foresight().await?;
    Ok(Json(json!({ "ok": true, "touched": touched })))
}
