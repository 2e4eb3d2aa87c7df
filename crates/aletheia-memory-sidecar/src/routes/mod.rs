//! Router assembly and bearer-token middleware (C9).

pub mod discovery;
pub mod evolution;
pub mod foresight;
pub mod graph;
pub mod health;
pub mod ingest;
pub mod retrieval;
pub mod temporal;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Bearer-token check, skipped when no token is configured and always
/// skipped for `/health`.
async fn require_bearer_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.token.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(next.run(req).await);
    };

    let supplied = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match supplied {
        Some(token) if token == expected => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/add", post(ingest::add))
        .route("/add_direct", post(ingest::add_direct))
        .route("/add_batch", post(ingest::add_batch))
        .route("/import", post(ingest::import))
        .route("/memories", get(ingest::list_memories))
        .route("/memories/{id}", delete(ingest::delete_memory))
        .route("/search", post(retrieval::search))
        .route("/search_enhanced", post(retrieval::search_enhanced))
        .route("/graph_search", post(retrieval::graph_search))
        .route("/graph_enhanced_search", post(retrieval::graph_enhanced_search))
        .route("/retract", post(evolution::retract))
        .route("/consolidate", post(evolution::consolidate))
        .route("/merge", post(evolution::merge))
        .route("/fact_stats", get(evolution::fact_stats))
        .route(
            "/temporal/episodes",
            post(temporal::create_episode).get(temporal::list_episodes),
        )
        .route("/temporal/facts", post(temporal::create_fact))
        .route("/temporal/facts/invalidate", post(temporal::invalidate_fact))
        .route("/temporal/since", post(temporal::since))
        .route("/temporal/what_changed", post(temporal::what_changed))
        .route("/temporal/at_time", post(temporal::at_time))
        .route("/temporal/stats", get(temporal::stats))
        .route("/evolution/check", post(evolution::check))
        .route("/evolution/reinforce", post(evolution::reinforce))
        .route("/evolution/decay", post(evolution::decay))
        .route("/evolution/stats", get(evolution::stats))
        .route("/discovery/discover", post(discovery::discover))
        .route("/discovery/explore_paths", post(discovery::explore_paths))
        .route("/discovery/generate_candidates", post(discovery::generate_candidates))
        .route("/discovery/candidates", get(discovery::candidates))
        .route("/discovery/stats", get(discovery::stats))
        .route("/foresight/add", post(foresight::add))
        .route("/foresight/active", get(foresight::active))
        .route("/foresight/decay", post(foresight::decay))
        .route("/graph_stats", get(graph::graph_stats))
        .route("/graph/analyze", post(graph::analyze))
        .route("/graph/export", get(graph::export))
        .route("/normalize_relationships", post(graph::normalize_relationships))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer_token));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
