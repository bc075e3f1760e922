//! Remote assistant gateway: delegates extraction to a hosted completion
//! service under a fixed JSON response contract, then validates and
//! normalizes the reply against the task entity model. The local
//! rule-based extractor remains the caller's fallback when this gateway
//! is unconfigured or failing.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::task::{Priority, RecurrencePattern, TaskDraft};
use crate::error::{AppError, AppResult};

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Tag used only to pick voice-synthesis parameters on the client; it has
/// no effect on task data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Encouraging,
    Calm,
    Excited,
    Understanding,
    Neutral,
}

/// One task draft as the model returns it: every field independently
/// nullable. Normalization maps these onto entity-model defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    reminder_date: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    is_recurring: Option<bool>,
    #[serde(default)]
    recurrence_pattern: Option<RecurrencePattern>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutcome {
    #[serde(default)]
    todos: Vec<DraftPayload>,
    #[serde(default)]
    questions: Option<Vec<String>>,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    emotion: Option<Emotion>,
}

/// Validated extraction result returned to the caller. Ambiguity is not
/// an error: it arrives as `needs_clarification` plus follow-up questions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOutcome {
    pub todos: Vec<TaskDraft>,
    pub questions: Option<Vec<String>>,
    pub needs_clarification: bool,
    pub response: Option<String>,
    pub emotion: Option<Emotion>,
}

#[derive(Debug)]
pub struct AssistantGateway {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AssistantGateway {
    pub fn new(api_key: String, model: String, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    /// Turn an utterance plus prior turns into a structured extraction
    /// result. `now` is injected into the prompt so date-relative phrases
    /// resolve against wall-clock time at call time.
    pub async fn parse(
        &self,
        text: &str,
        conversation_history: &[String],
        now: DateTime<Utc>,
    ) -> AppResult<ParseOutcome> {
        let messages = build_messages(text, conversation_history, now);

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
            "response_format": { "type": "json_object" }
        });

        let resp = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream {
                status: None,
                details: format!("API request failed: {e}"),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: Some(status),
                details: text,
            });
        }

        let api_resp: Value = resp.json().await.map_err(|e| AppError::Upstream {
            status: None,
            details: format!("Failed to parse API response: {e}"),
        })?;

        let content = api_resp["choices"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| AppError::Upstream {
                status: None,
                details: "No content in API response".to_string(),
            })?;

        parse_reply(content)
    }
}

/// Parse and normalize the model's reply. Malformed JSON or out-of-
/// vocabulary enum values surface as upstream errors, never as coerced
/// or fabricated task data.
fn parse_reply(content: &str) -> AppResult<ParseOutcome> {
    // Strip markdown code fences if present
    let trimmed = content.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let json_str = json_str.strip_suffix("```").unwrap_or(json_str).trim();

    let raw: RawOutcome = serde_json::from_str(json_str).map_err(|e| AppError::Upstream {
        status: None,
        details: format!("Unparsable assistant reply: {e}"),
    })?;

    Ok(normalize(raw))
}

/// Map nullable draft payloads onto entity-model defaults. Drafts with no
/// usable title are dropped; they cannot become tasks.
fn normalize(raw: RawOutcome) -> ParseOutcome {
    let todos = raw
        .todos
        .into_iter()
        .filter_map(|payload| {
            let title = payload.title.filter(|t| !t.trim().is_empty())?;
            let mut draft = TaskDraft::new(title);
            draft.description = payload.description.unwrap_or_default();
            draft.priority = payload.priority.unwrap_or_default();
            draft.due_date = payload.due_date;
            draft.reminder_date = payload.reminder_date;
            if let Some(category) = payload.category {
                draft.category = category;
            }
            draft.is_recurring = payload.is_recurring.unwrap_or(false);
            draft.recurrence_pattern = payload.recurrence_pattern;
            Some(draft)
        })
        .collect();

    ParseOutcome {
        todos,
        questions: raw.questions,
        needs_clarification: raw.needs_clarification,
        response: raw.response,
        emotion: raw.emotion,
    }
}

fn build_messages(text: &str, conversation_history: &[String], now: DateTime<Utc>) -> Vec<Value> {
    let mut messages = vec![json!({
        "role": "system",
        "content": build_system_prompt(now),
    })];

    // Even index = user turn, odd = assistant turn
    for (i, turn) in conversation_history.iter().enumerate() {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        messages.push(json!({ "role": role, "content": turn }));
    }

    messages.push(json!({ "role": "user", "content": text }));
    messages
}

fn build_system_prompt(now: DateTime<Utc>) -> String {
    let mut prompt = String::from(
        "You are Adam, a friendly and supportive AI life assistant who helps manage tasks.\n\
         Keep spoken responses concise (1-3 sentences) and natural.\n\n\
         Return ONLY a JSON object with this structure:\n\
         {\n\
           \"todos\": [\n\
             {\n\
               \"title\": \"Task title\",\n\
               \"description\": \"Optional description\",\n\
               \"dueDate\": \"ISO8601 date string or null\",\n\
               \"reminderDate\": \"ISO8601 date string (30min before dueDate) or null\",\n\
               \"priority\": \"low|medium|high|urgent or null\",\n\
               \"category\": \"Work|Health|Shopping|Family|Bills|General or null\",\n\
               \"isRecurring\": true/false or null,\n\
               \"recurrencePattern\": \"daily|weekly|monthly|yearly or null\"\n\
             }\n\
           ],\n\
           \"questions\": [\"Question 1\"] or null,\n\
           \"needsClarification\": true/false,\n\
           \"response\": \"Natural, friendly reply to speak back\",\n\
           \"emotion\": \"happy|encouraging|calm|excited|understanding|neutral\"\n\
         }\n\n\
         Ask questions when a task might be recurring, the time is ambiguous,\n\
         or the priority is unclear. Extract dates from natural language\n\
         (\"tomorrow at 2pm\", \"today at 5pm\", \"in 2 hours\") and always set\n\
         reminderDate to 30 minutes before dueDate when dueDate exists.\n\n",
    );

    prompt.push_str(&format!("Current date/time: {}\n", now.to_rfc3339()));
    prompt
}
