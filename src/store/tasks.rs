use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::Store;
use crate::core::task::{Priority, RecurrencePattern, Task, TaskPatch};
use crate::error::AppResult;

const TASK_COLUMNS: &str = "id, title, description, is_completed, priority, due_date, \
     reminder_date, category, is_recurring, recurrence_pattern, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let priority: String = row.get(4)?;
    let recurrence: Option<String> = row.get(9)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        is_completed: row.get(3)?,
        priority: Priority::from_str(&priority).unwrap_or_default(),
        due_date: row.get(5)?,
        reminder_date: row.get(6)?,
        category: row.get(7)?,
        is_recurring: row.get(8)?,
        recurrence_pattern: recurrence.as_deref().and_then(RecurrencePattern::from_str),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn opt_date(value: Option<DateTime<Utc>>) -> Value {
    match value {
        Some(d) => Value::Text(d.to_rfc3339()),
        None => Value::Null,
    }
}

impl Store {
    /// All tasks owned by the user, newest-created first.
    pub fn list_tasks(&self, user_id: &str) -> AppResult<Vec<Task>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM todos WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;
        let tasks = stmt
            .query_map(params![user_id], task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    pub fn get_task(&self, user_id: &str, task_id: &str) -> AppResult<Option<Task>> {
        let conn = self.conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM todos WHERE id = ?1 AND user_id = ?2"),
                params![task_id, user_id],
                task_from_row,
            )
            .optional()?;
        Ok(task)
    }

    pub fn insert_task(&self, user_id: &str, task: &Task) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO todos (
               id, user_id, title, description, is_completed, priority,
               due_date, reminder_date, category, is_recurring, recurrence_pattern,
               created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id,
                user_id,
                task.title,
                task.description,
                task.is_completed,
                task.priority.as_str(),
                opt_date(task.due_date),
                opt_date(task.reminder_date),
                task.category,
                task.is_recurring,
                task.recurrence_pattern.map(|p| p.as_str()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Full-field overwrite of an existing row (the sync replace path).
    /// Returns false when no owned row matched.
    pub fn replace_task(&self, user_id: &str, task: &Task) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE todos SET
               title = ?1, description = ?2, is_completed = ?3, priority = ?4,
               due_date = ?5, reminder_date = ?6, category = ?7,
               is_recurring = ?8, recurrence_pattern = ?9, updated_at = ?10
             WHERE id = ?11 AND user_id = ?12",
            params![
                task.title,
                task.description,
                task.is_completed,
                task.priority.as_str(),
                opt_date(task.due_date),
                opt_date(task.reminder_date),
                task.category,
                task.is_recurring,
                task.recurrence_pattern.map(|p| p.as_str()),
                task.updated_at.to_rfc3339(),
                task.id,
                user_id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Apply a partial update; only fields present in the patch are
    /// written. Returns the updated task, or None when no owned row matched.
    pub fn apply_patch(
        &self,
        user_id: &str,
        task_id: &str,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Task>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            sets.push("title = ?");
            values.push(Value::Text(title.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push("description = ?");
            values.push(Value::Text(description.clone()));
        }
        if let Some(is_completed) = patch.is_completed {
            sets.push("is_completed = ?");
            values.push(Value::Integer(is_completed as i64));
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?");
            values.push(Value::Text(priority.as_str().to_string()));
        }
        if let Some(due_date) = patch.due_date {
            sets.push("due_date = ?");
            values.push(opt_date(due_date));
        }
        if let Some(reminder_date) = patch.reminder_date {
            sets.push("reminder_date = ?");
            values.push(opt_date(reminder_date));
        }
        if let Some(category) = &patch.category {
            sets.push("category = ?");
            values.push(Value::Text(category.clone()));
        }
        if let Some(is_recurring) = patch.is_recurring {
            sets.push("is_recurring = ?");
            values.push(Value::Integer(is_recurring as i64));
        }
        if let Some(pattern) = patch.recurrence_pattern {
            sets.push("recurrence_pattern = ?");
            values.push(match pattern {
                Some(p) => Value::Text(p.as_str().to_string()),
                None => Value::Null,
            });
        }

        sets.push("updated_at = ?");
        values.push(Value::Text(now.to_rfc3339()));
        values.push(Value::Text(task_id.to_string()));
        values.push(Value::Text(user_id.to_string()));

        let sql = format!(
            "UPDATE todos SET {} WHERE id = ? AND user_id = ?",
            sets.join(", ")
        );

        let changed = {
            let conn = self.conn()?;
            conn.execute(&sql, params_from_iter(values))?
        };
        if changed == 0 {
            return Ok(None);
        }
        self.get_task(user_id, task_id)
    }

    /// Hard delete. Returns false when no owned row matched.
    pub fn delete_task(&self, user_id: &str, task_id: &str) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
            params![task_id, user_id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::TaskDraft;
    use chrono::TimeZone;

    fn seeded_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .create_user("u1", "a@example.com", "hash", Utc::now())
            .unwrap();
        store
            .create_user("u2", "b@example.com", "hash", Utc::now())
            .unwrap();
        store
    }

    fn make_task(id: &str, title: &str, created: DateTime<Utc>) -> Task {
        TaskDraft::new(title).into_task(id.to_string(), created)
    }

    #[test]
    fn insert_then_get_round_trips_every_field() {
        let store = seeded_store();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut task = make_task("t1", "Call dentist", now);
        task.priority = Priority::High;
        task.due_date = Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap());
        task.reminder_date = Some(Utc.with_ymd_and_hms(2024, 1, 16, 13, 30, 0).unwrap());
        task.category = "Health".to_string();
        task.is_recurring = true;
        task.recurrence_pattern = Some(RecurrencePattern::Weekly);

        store.insert_task("u1", &task).unwrap();
        let fetched = store.get_task("u1", "t1").unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[test]
    fn list_is_newest_created_first() {
        let store = seeded_store();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        store.insert_task("u1", &make_task("old", "Old", t0)).unwrap();
        store.insert_task("u1", &make_task("new", "New", t1)).unwrap();

        let tasks = store.list_tasks("u1").unwrap();
        assert_eq!(tasks[0].id, "new");
        assert_eq!(tasks[1].id, "old");
    }

    #[test]
    fn tasks_are_scoped_to_their_owner() {
        let store = seeded_store();
        let now = Utc::now();
        store.insert_task("u1", &make_task("t1", "Mine", now)).unwrap();

        assert!(store.get_task("u2", "t1").unwrap().is_none());
        assert!(store.list_tasks("u2").unwrap().is_empty());
        assert!(!store.delete_task("u2", "t1").unwrap());
        assert!(store.get_task("u1", "t1").unwrap().is_some());
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let store = seeded_store();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let mut task = make_task("t1", "Call dentist", now);
        task.due_date = Some(Utc.with_ymd_and_hms(2024, 1, 16, 14, 0, 0).unwrap());
        task.category = "Health".to_string();
        store.insert_task("u1", &task).unwrap();

        let patch = TaskPatch {
            is_completed: Some(true),
            ..TaskPatch::default()
        };
        let later = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let updated = store.apply_patch("u1", "t1", &patch, later).unwrap().unwrap();

        assert!(updated.is_completed);
        assert_eq!(updated.title, "Call dentist");
        assert_eq!(updated.due_date, task.due_date);
        assert_eq!(updated.category, "Health");
        assert_eq!(updated.created_at, now);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn patch_with_explicit_null_clears_the_field() {
        let store = seeded_store();
        let now = Utc::now();
        let mut task = make_task("t1", "Call dentist", now);
        task.due_date = Some(now);
        store.insert_task("u1", &task).unwrap();

        let patch = TaskPatch {
            due_date: Some(None),
            ..TaskPatch::default()
        };
        let updated = store.apply_patch("u1", "t1", &patch, now).unwrap().unwrap();
        assert_eq!(updated.due_date, None);
    }

    #[test]
    fn patch_missing_row_returns_none() {
        let store = seeded_store();
        let patch = TaskPatch {
            is_completed: Some(true),
            ..TaskPatch::default()
        };
        assert!(store
            .apply_patch("u1", "nope", &patch, Utc::now())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_missing_row_leaves_store_unchanged() {
        let store = seeded_store();
        store
            .insert_task("u1", &make_task("t1", "Keep me", Utc::now()))
            .unwrap();
        assert!(!store.delete_task("u1", "nope").unwrap());
        assert_eq!(store.list_tasks("u1").unwrap().len(), 1);
    }
}
