//! HTTP binding. Route table realizing the transport-agnostic
//! operation entry points over axum, with tower-http CORS.

pub mod handlers;
pub mod sse;
pub mod types;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::debate::DebateRegistry;
use crate::fallback::ProviderRegistry;
use crate::health::HealthMonitor;
use crate::models::{ModelRef, Session};
use crate::router::RequestRouter;
use crate::store::InMemoryStore;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RequestRouter>,
    pub debates: Arc<DebateRegistry>,
    pub health: Arc<HealthMonitor>,
    pub providers: Arc<ProviderRegistry>,
    pub sessions: Arc<InMemoryStore<Uuid, Session>>,
    pub default_model: ModelRef,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/completions", post(handlers::complete))
        .route("/v1/completions/stream", post(handlers::complete_stream))
        .route("/v1/chat/completions", post(handlers::complete))
        .route("/v1/debates", post(handlers::create_debate))
        .route("/v1/debates", get(handlers::list_debates))
        .route("/v1/debates/:debate_id", get(handlers::get_debate))
        .route("/v1/debates/:debate_id", delete(handlers::delete_debate))
        .route("/v1/debates/:debate_id/status", get(handlers::get_debate_status))
        .route("/v1/debates/:debate_id/results", get(handlers::get_debate_results))
        .route("/v1/sessions", post(handlers::create_session))
        .route("/v1/sessions", get(handlers::list_sessions))
        .route("/v1/sessions/:session_id", get(handlers::get_session))
        .route("/v1/sessions/:session_id", delete(handlers::terminate_session))
        .route("/v1/health", get(handlers::get_health))
        .route("/healthz", get(handlers::get_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

