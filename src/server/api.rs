//! HTTP API over the scoped cache and the conversation router.
//!
//! - GET/DELETE /v1/data/{scope}
//! - GET/PUT/DELETE /v1/data/{scope}/{field}, POST .../append
//! - DELETE /v1/data
//! - PUT/DELETE /v1/conversations/{chat_id}
//! - POST /v1/updates
//! - GET /health

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::cache::field_store::{CacheError, ScopedCache};
use crate::cache::key::Scope;
use crate::cache::ttl::Ttl;
use crate::conversation::{Container, ConversationRouter, DispatchOutcome, HandlerRef, Update};

/// Application state shared across handlers.
pub struct AppState {
    pub cache: ScopedCache,
    pub router: ConversationRouter,
    pub container: Arc<Container>,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/data", axum::routing::delete(wipe_all))
        .route("/v1/data/{scope}", get(get_entity).delete(delete_entity))
        .route(
            "/v1/data/{scope}/{field}",
            get(get_field).put(set_field).delete(delete_field),
        )
        .route("/v1/data/{scope}/{field}/append", post(append_field))
        .route(
            "/v1/conversations/{chat_id}",
            put(set_conversation).delete(clear_conversation),
        )
        .route("/v1/updates", post(dispatch_update))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Body of a field write.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    pub value: Value,
    /// Explicit TTL in seconds.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Never expire. Ignored when `ttl_secs` is given.
    #[serde(default)]
    pub persistent: bool,
}

impl WriteRequest {
    pub fn ttl(&self) -> Ttl {
        match (self.ttl_secs, self.persistent) {
            (Some(secs), _) => Ttl::After(Duration::from_secs(secs)),
            (None, true) => Ttl::Never,
            (None, false) => Ttl::Default,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub update_id: i64,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub handlers: Vec<String>,
}

fn parse_scope(raw: &str) -> Result<Scope, StatusCode> {
    raw.parse().map_err(|_| StatusCode::BAD_REQUEST)
}

fn status_for(err: &CacheError) -> StatusCode {
    match err {
        CacheError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        CacheError::MalformedDictionary { .. } | CacheError::NotASequence { .. } => {
            StatusCode::CONFLICT
        }
        CacheError::Encoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

// ─── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        handlers: state
            .router
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}

async fn get_entity(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let scope = parse_scope(&scope)?;
    match state.cache.scope(scope).get().await {
        Ok(Some(dict)) => Ok(Json(dict.into_value())),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(status_for(&e)),
    }
}

async fn delete_entity(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let scope = parse_scope(&scope)?;
    state
        .cache
        .scope(scope)
        .delete()
        .await
        .map_err(|e| status_for(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn wipe_all(State(state): State<Arc<AppState>>) -> Result<StatusCode, StatusCode> {
    state.cache.wipe_all().await.map_err(|e| status_for(&e))?;
    info!("Cache wiped");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_field(
    State(state): State<Arc<AppState>>,
    Path((scope, field)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let scope = parse_scope(&scope)?;
    match state.cache.scope(scope).get_field(&field).await {
        Ok(Some(value)) => Ok(Json(value)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(status_for(&e)),
    }
}

async fn set_field(
    State(state): State<Arc<AppState>>,
    Path((scope, field)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Result<StatusCode, StatusCode> {
    let scope = parse_scope(&scope)?;
    let ttl = req.ttl();
    state
        .cache
        .scope(scope)
        .set_field_with_ttl(&field, req.value, ttl)
        .await
        .map_err(|e| status_for(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn append_field(
    State(state): State<Arc<AppState>>,
    Path((scope, field)): Path<(String, String)>,
    Json(req): Json<WriteRequest>,
) -> Result<StatusCode, StatusCode> {
    let scope = parse_scope(&scope)?;
    let ttl = req.ttl();
    state
        .cache
        .scope(scope)
        .append_field_with_ttl(&field, req.value, ttl)
        .await
        .map_err(|e| status_for(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_field(
    State(state): State<Arc<AppState>>,
    Path((scope, field)): Path<(String, String)>,
) -> Result<StatusCode, StatusCode> {
    let scope = parse_scope(&scope)?;
    state
        .cache
        .scope(scope)
        .delete_field(&field)
        .await
        .map_err(|e| status_for(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_conversation(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(handler): Json<HandlerRef>,
) -> Result<StatusCode, StatusCode> {
    if !state.router.registry().contains(&handler.handler) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    state
        .router
        .set_handler(chat_id, &handler)
        .await
        .map_err(|e| status_for(&e))?;
    info!(chat_id, handler = %handler.handler, "Conversation handler set");
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    state
        .router
        .clear_handler(chat_id)
        .await
        .map_err(|e| status_for(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dispatch_update(
    State(state): State<Arc<AppState>>,
    Json(update): Json<Update>,
) -> Result<Json<DispatchResponse>, StatusCode> {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!("dispatch", %request_id, chat_id = update.chat_id);

    let outcome = state
        .router
        .dispatch(update.chat_id, &update, state.container.clone())
        .instrument(span)
        .await;

    let (outcome, reply) = match outcome {
        DispatchOutcome::NoHandler => ("no_handler", None),
        DispatchOutcome::Handled(reply) => ("handled", Some(reply)),
        DispatchOutcome::Failed => ("failed", None),
        DispatchOutcome::FetchFailed => return Err(StatusCode::SERVICE_UNAVAILABLE),
    };

    Ok(Json(DispatchResponse {
        update_id: update.update_id,
        outcome: outcome.to_string(),
        reply,
    }))
}
