//! `Database` trait — the async persistence interface the planner reads through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::planner::model::{Event, Preference, PreferenceUpdate, Task, UpsertOutcome};

/// Inclusive bounds for filtering events: `start >= window.start && end <= window.end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Backend-agnostic database trait covering preferences, tasks and events.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Preferences ─────────────────────────────────────────────────

    /// Get a user's stored preference profile.
    async fn get_preference(&self, user_id: &str) -> Result<Option<Preference>, DatabaseError>;

    /// Merge supplied fields into an existing profile, or create one with
    /// defaults for everything not supplied.
    async fn upsert_preference(
        &self,
        update: &PreferenceUpdate,
    ) -> Result<UpsertOutcome, DatabaseError>;

    // ── Tasks ───────────────────────────────────────────────────────

    /// Insert a new task.
    async fn create_task(&self, task: &Task) -> Result<(), DatabaseError>;

    /// All tasks for a user, earliest due date first (undated first).
    async fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>, DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    /// Insert a new calendar event.
    async fn create_event(&self, event: &Event) -> Result<(), DatabaseError>;

    /// Events for a user sorted by start, optionally limited to a window.
    async fn list_events(
        &self,
        user_id: &str,
        window: Option<TimeWindow>,
    ) -> Result<Vec<Event>, DatabaseError>;
}
