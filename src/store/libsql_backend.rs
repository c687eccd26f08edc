//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! fixed-width RFC 3339 strings (microseconds, `Z` suffix) so that text
//! comparison in SQL orders them chronologically.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::planner::model::{
    Event, Preference, PreferenceUpdate, Priority, Task, TimeOfDay, UpsertOutcome,
};
use crate::store::migrations;
use crate::store::traits::{Database, TimeWindow};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn insert_preference(&self, pref: &Preference) -> Result<bool, DatabaseError> {
        let now = format_ts(&Utc::now());
        let weekdays = serde_json::to_string(&pref.availability_weekdays)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        let inserted = self
            .conn()
            .execute(
                "INSERT INTO preferences (user_id, focus_period_minutes, short_session_minutes, preferred_time_of_day, availability_weekdays, earliest_hour, latest_hour, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT (user_id) DO NOTHING",
                params![
                    pref.user_id.as_str(),
                    i64::from(pref.focus_period_minutes),
                    i64::from(pref.short_session_minutes),
                    pref.preferred_time_of_day.map(|t| t.to_string()),
                    weekdays,
                    i64::from(pref.earliest_hour),
                    i64::from(pref.latest_hour),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_preference: {e}")))?;
        Ok(inserted > 0)
    }

    async fn update_preference(&self, pref: &Preference) -> Result<(), DatabaseError> {
        let weekdays = serde_json::to_string(&pref.availability_weekdays)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "UPDATE preferences SET focus_period_minutes = ?1, short_session_minutes = ?2, preferred_time_of_day = ?3, availability_weekdays = ?4, earliest_hour = ?5, latest_hour = ?6, updated_at = ?7 WHERE user_id = ?8",
                params![
                    i64::from(pref.focus_period_minutes),
                    i64::from(pref.short_session_minutes),
                    pref.preferred_time_of_day.map(|t| t.to_string()),
                    weekdays,
                    i64::from(pref.earliest_hour),
                    i64::from(pref.latest_hour),
                    format_ts(&Utc::now()),
                    pref.user_id.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_preference: {e}")))?;
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn format_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn parse_related_ids(raw: Option<String>) -> HashMap<String, String> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn related_ids_json(ids: &HashMap<String, String>) -> Result<String, DatabaseError> {
    serde_json::to_string(ids).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn parse_id(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

/// Read a non-negative integer column, falling back to `default` when absent
/// or out of range.
fn get_u32(row: &libsql::Row, idx: i32, default: u32) -> u32 {
    row.get::<i64>(idx)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(default)
}

const PREFERENCE_COLUMNS: &str = "user_id, focus_period_minutes, short_session_minutes, preferred_time_of_day, availability_weekdays, earliest_hour, latest_hour";

const TASK_COLUMNS: &str = "id, user_id, title, due, priority, related_ids, completed, created_at";

const EVENT_COLUMNS: &str = "id, user_id, title, start_at, end_at, color, source, related_ids";

/// Map a row to a `Preference`, applying defaults to malformed fields.
fn row_to_preference(row: &libsql::Row) -> Result<Preference, DatabaseError> {
    let user_id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("preference.user_id: {e}")))?;
    let defaults = Preference::defaults_for(user_id.as_str());

    let preferred_time_of_day = row
        .get::<String>(3)
        .ok()
        .and_then(|s| s.parse::<TimeOfDay>().ok());

    let availability_weekdays = row
        .get::<String>(4)
        .ok()
        .and_then(|s| serde_json::from_str::<Vec<u8>>(&s).ok())
        .unwrap_or_else(|| defaults.availability_weekdays.clone());

    Ok(Preference {
        focus_period_minutes: get_u32(row, 1, defaults.focus_period_minutes),
        short_session_minutes: get_u32(row, 2, defaults.short_session_minutes),
        preferred_time_of_day,
        availability_weekdays,
        earliest_hour: get_u32(row, 5, defaults.earliest_hour),
        latest_hour: get_u32(row, 6, defaults.latest_hour),
        user_id,
    })
}

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| DatabaseError::Query(format!("task.id: {e}")))?;
    let user_id: String = row.get(1).map_err(|e| DatabaseError::Query(format!("task.user_id: {e}")))?;
    let title: String = row.get(2).map_err(|e| DatabaseError::Query(format!("task.title: {e}")))?;

    let due = match row.get::<String>(3).ok().filter(|s| !s.is_empty()) {
        Some(s) => Some(parse_ts(&s, "task.due")?),
        None => None,
    };

    let priority_str: Option<String> = row.get(4).ok();
    let created_at_str: String = row
        .get(7)
        .map_err(|e| DatabaseError::Query(format!("task.created_at: {e}")))?;

    Ok(Task {
        id: parse_id(&id_str, "task.id")?,
        user_id,
        title,
        due,
        priority: Priority::from_stored(priority_str.as_deref()),
        related_ids: parse_related_ids(row.get(5).ok()),
        completed: row.get::<i64>(6).unwrap_or(0) != 0,
        created_at: parse_ts(&created_at_str, "task.created_at")?,
    })
}

fn row_to_event(row: &libsql::Row) -> Result<Event, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| DatabaseError::Query(format!("event.id: {e}")))?;
    let user_id: String = row.get(1).map_err(|e| DatabaseError::Query(format!("event.user_id: {e}")))?;
    let title: String = row.get(2).map_err(|e| DatabaseError::Query(format!("event.title: {e}")))?;
    let start_str: String = row.get(3).map_err(|e| DatabaseError::Query(format!("event.start: {e}")))?;
    let end_str: String = row.get(4).map_err(|e| DatabaseError::Query(format!("event.end: {e}")))?;

    Ok(Event {
        id: parse_id(&id_str, "event.id")?,
        user_id,
        title,
        start: parse_ts(&start_str, "event.start")?,
        end: parse_ts(&end_str, "event.end")?,
        color: row.get::<String>(5).ok(),
        source: row.get::<String>(6).ok(),
        related_ids: parse_related_ids(row.get(7).ok()),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Preferences ─────────────────────────────────────────────────

    async fn get_preference(&self, user_id: &str) -> Result<Option<Preference>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PREFERENCE_COLUMNS} FROM preferences WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_preference: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_preference(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_preference row: {e}"))),
        }
    }

    async fn upsert_preference(
        &self,
        update: &PreferenceUpdate,
    ) -> Result<UpsertOutcome, DatabaseError> {
        if self.get_preference(&update.user_id).await?.is_none() {
            let mut pref = Preference::defaults_for(update.user_id.as_str());
            pref.apply(update);
            if self.insert_preference(&pref).await? {
                debug!(user_id = %update.user_id, "Preference created");
                return Ok(UpsertOutcome::Created);
            }
            // Lost a race with a concurrent insert; merge into that row instead.
        }

        let mut pref = self
            .get_preference(&update.user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "preference".into(),
                id: update.user_id.clone(),
            })?;
        pref.apply(update);
        self.update_preference(&pref).await?;
        debug!(user_id = %update.user_id, "Preference updated");
        Ok(UpsertOutcome::Updated)
    }

    // ── Tasks ───────────────────────────────────────────────────────

    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO tasks (id, user_id, title, due, priority, related_ids, completed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    task.id.to_string(),
                    task.user_id.as_str(),
                    task.title.as_str(),
                    task.due.as_ref().map(format_ts),
                    task.priority.to_string(),
                    related_ids_json(&task.related_ids)?,
                    task.completed as i64,
                    format_ts(&task.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_task: {e}")))?;
        debug!(id = %task.id, "Task created");
        Ok(())
    }

    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 ORDER BY due ASC, created_at ASC"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tasks row: {e}")))?
        {
            tasks.push(row_to_task(&row)?);
        }
        Ok(tasks)
    }

    // ── Events ──────────────────────────────────────────────────────

    async fn create_event(&self, event: &Event) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO events (id, user_id, title, start_at, end_at, color, source, related_ids)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.id.to_string(),
                    event.user_id.as_str(),
                    event.title.as_str(),
                    format_ts(&event.start),
                    format_ts(&event.end),
                    event.color.clone(),
                    event.source.clone(),
                    related_ids_json(&event.related_ids)?,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_event: {e}")))?;
        debug!(id = %event.id, "Event created");
        Ok(())
    }

    async fn list_events(
        &self,
        user_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<Vec<Event>, DatabaseError> {
        let conn = self.conn();
        let mut rows = match window {
            Some(w) => conn
                .query(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE user_id = ?1 AND start_at >= ?2 AND end_at <= ?3 ORDER BY start_at ASC"),
                    params![user_id, format_ts(&w.start), format_ts(&w.end)],
                )
                .await,
            None => conn
                .query(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE user_id = ?1 ORDER BY start_at ASC"),
                    params![user_id],
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("list_events: {e}")))?;

        let mut events = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_events row: {e}")))?
        {
            events.push(row_to_event(&row)?);
        }
        Ok(events)
    }
}
