mod ai;
pub mod auth;
mod todos;

pub use auth::{AuthUser, JwtKeys};

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::assistant::AssistantGateway;
use crate::config::ServerConfig;
use crate::error::AppResult;
use crate::store::Store;

#[derive(Debug)]
pub struct AppState {
    pub store: Store,
    /// Absent when no upstream credential is configured; the parse route
    /// reports that as a configuration error.
    pub assistant: Option<AssistantGateway>,
    pub jwt: JwtKeys,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &ServerConfig, store: Store) -> AppResult<SharedState> {
        let assistant = config
            .openai_api_key
            .clone()
            .map(|key| {
                AssistantGateway::new(key, config.openai_model.clone(), config.assistant_timeout)
            })
            .transpose()?;

        Ok(Arc::new(Self {
            store,
            assistant,
            jwt: JwtKeys::new(&config.jwt_secret),
        }))
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/todos", get(todos::list).post(todos::create))
        .route("/api/todos/sync", post(todos::sync_batch))
        .route(
            "/api/todos/:id",
            get(todos::get_one)
                .put(todos::update)
                .delete(todos::remove),
        )
        .route("/api/ai/parse", post(ai::parse))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now().to_rfc3339() }))
}
