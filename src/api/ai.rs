use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::auth::AuthUser;
use super::SharedState;
use crate::assistant::ParseOutcome;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    conversation_history: Vec<String>,
}

/// Delegate natural-language extraction to the remote assistant. The
/// current instant is injected per call so "tomorrow" and "in 2 hours"
/// resolve against real wall-clock time.
pub async fn parse(
    _auth: AuthUser,
    State(state): State<SharedState>,
    Json(body): Json<ParseBody>,
) -> AppResult<Json<ParseOutcome>> {
    if body.text.trim().is_empty() {
        return Err(AppError::MissingField("Text"));
    }

    let gateway = state
        .assistant
        .as_ref()
        .ok_or(AppError::Config("OpenAI API key"))?;

    let outcome = gateway
        .parse(&body.text, &body.conversation_history, Utc::now())
        .await?;
    Ok(Json(outcome))
}
