//! Bulk reconciliation of client-held todos against server state.
//!
//! Each record is an independent upsert: existing rows get a full-field
//! overwrite (sync records are complete snapshots by contract, unlike the
//! single-task PUT which is a patch), absent rows are inserted under the
//! client-supplied id. Partial success is the normal case; per-record
//! failures land in the `errors` partition and never abort the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::task::{Priority, RecurrencePattern, Task};
use crate::error::AppResult;
use crate::store::Store;

const MISSING_ID_OR_TITLE: &str = "missing id or title";

/// One record from the client's sync batch. Everything beyond the merge
/// key and title is optional with entity-model defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncRecord {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    is_completed: bool,
    #[serde(default)]
    priority: Priority,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    reminder_date: Option<DateTime<Utc>>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    is_recurring: bool,
    #[serde(default)]
    recurrence_pattern: Option<RecurrencePattern>,
}

fn default_category() -> String {
    "General".to_string()
}

#[derive(Debug, Serialize)]
pub struct SyncError {
    pub record: Value,
    pub reason: String,
}

/// Partitioned batch outcome; lists reflect membership, not input order.
#[derive(Debug, Default, Serialize)]
pub struct SyncOutcome {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub errors: Vec<SyncError>,
}

enum Applied {
    Created,
    Updated,
}

/// Reconcile a batch of records for one user. Never fails as a whole;
/// every record either lands in `created`/`updated` or in `errors`.
pub fn reconcile(
    store: &Store,
    user_id: &str,
    records: Vec<Value>,
    now: DateTime<Utc>,
) -> SyncOutcome {
    let mut outcome = SyncOutcome::default();

    for raw in records {
        let record: SyncRecord = match serde_json::from_value(raw.clone()) {
            Ok(record) => record,
            Err(err) => {
                outcome.errors.push(SyncError {
                    record: raw,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let (id, title) = match (&record.id, &record.title) {
            (Some(id), Some(title)) if !id.trim().is_empty() && !title.trim().is_empty() => {
                (id.clone(), title.clone())
            }
            _ => {
                outcome.errors.push(SyncError {
                    record: raw,
                    reason: MISSING_ID_OR_TITLE.to_string(),
                });
                continue;
            }
        };

        match apply_record(store, user_id, &id, &title, &record, now) {
            Ok(Applied::Created) => outcome.created.push(id),
            Ok(Applied::Updated) => outcome.updated.push(id),
            Err(err) => outcome.errors.push(SyncError {
                record: raw,
                reason: err.to_string(),
            }),
        }
    }

    outcome
}

fn apply_record(
    store: &Store,
    user_id: &str,
    id: &str,
    title: &str,
    record: &SyncRecord,
    now: DateTime<Utc>,
) -> AppResult<Applied> {
    // created_at only matters on the insert path; replace never writes it
    let task = Task {
        id: id.to_string(),
        title: title.to_string(),
        description: record.description.clone(),
        is_completed: record.is_completed,
        priority: record.priority,
        due_date: record.due_date,
        reminder_date: record.reminder_date,
        category: record.category.clone(),
        is_recurring: record.is_recurring,
        recurrence_pattern: record.recurrence_pattern,
        created_at: now,
        updated_at: now,
    };

    // replace_task reports whether a row matched; a row deleted between
    // batch records falls through to insert instead of being reported as
    // updated with nothing written
    if store.replace_task(user_id, &task)? {
        Ok(Applied::Updated)
    } else {
        store.insert_task(user_id, &task)?;
        Ok(Applied::Created)
    }
}
