use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::AuthUser;
use super::SharedState;
use crate::core::task::{Task, TaskDraft, TaskPatch};
use crate::error::{AppError, AppResult};
use crate::sync::{self, SyncOutcome};

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> AppResult<Json<Value>> {
    let tasks = state.store.list_tasks(&auth.user_id)?;
    Ok(Json(json!({ "todos": tasks })))
}

pub async fn get_one(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> AppResult<Json<Task>> {
    let task = state
        .store
        .get_task(&auth.user_id, &id)?
        .ok_or(AppError::NotFound("Todo"))?;
    Ok(Json(task))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(draft): Json<TaskDraft>,
) -> AppResult<(StatusCode, Json<Task>)> {
    draft.validate()?;

    let task = draft.into_task(Uuid::new_v4().to_string(), Utc::now());
    state.store.insert_task(&auth.user_id, &task)?;
    tracing::debug!(user_id = %auth.user_id, task_id = %task.id, "todo created");

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> AppResult<Json<Task>> {
    if patch.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }
    patch.validate()?;

    let task = state
        .store
        .apply_patch(&auth.user_id, &id, &patch, Utc::now())?
        .ok_or(AppError::NotFound("Todo"))?;
    Ok(Json(task))
}

pub async fn remove(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    if !state.store.delete_task(&auth.user_id, &id)? {
        return Err(AppError::NotFound("Todo"));
    }
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct SyncBody {
    #[serde(default)]
    todos: Value,
}

pub async fn sync_batch(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<SyncBody>,
) -> AppResult<Json<SyncOutcome>> {
    let Value::Array(records) = body.todos else {
        return Err(AppError::Validation("Todos must be an array".to_string()));
    };

    // Batches can be large; keep the per-record upserts off the runtime
    let user_id = auth.user_id;
    let outcome = tokio::task::spawn_blocking(move || {
        sync::reconcile(&state.store, &user_id, records, Utc::now())
    })
    .await
    .map_err(|e| AppError::Internal(format!("sync task panicked: {e}")))?;

    tracing::debug!(
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        errors = outcome.errors.len(),
        "sync batch reconciled"
    );
    Ok(Json(outcome))
}
