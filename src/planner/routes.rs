//! REST endpoints for calendar events, tasks, preferences and suggestions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::model::{Event, Preference, PreferenceUpdate, Priority, Suggestion, Task, UpsertOutcome};
use super::suggester::SlotSuggester;
use crate::error::ApiError;
use crate::store::{Database, TimeWindow};

const DEFAULT_HORIZON_DAYS: u32 = 7;

/// Shared state for planner routes.
#[derive(Clone)]
pub struct PlannerState {
    pub db: Arc<dyn Database>,
    pub suggester: Arc<SlotSuggester>,
}

impl PlannerState {
    pub fn new(db: Arc<dyn Database>, suggester: SlotSuggester) -> Self {
        Self {
            db,
            suggester: Arc::new(suggester),
        }
    }
}

/// Build the planner router, with permissive CORS and request tracing.
pub fn planner_routes(state: PlannerState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/suggestions", post(generate_suggestions))
        .route("/events", post(create_event).get(list_events))
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/preferences", post(upsert_preferences))
        .route("/preferences/{user_id}", get(get_preferences))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ── Health ──────────────────────────────────────────────────────────────

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({"message": "Study planner backend running"}))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "study-planner"
    }))
}

fn require_user(user_id: &str) -> Result<(), ApiError> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".into()));
    }
    Ok(())
}

// ── Suggestions ─────────────────────────────────────────────────────────

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

#[derive(Debug, Deserialize)]
struct SuggestionRequest {
    user_id: String,
    #[serde(default = "default_horizon_days")]
    horizon_days: u32,
}

async fn generate_suggestions(
    State(state): State<PlannerState>,
    Json(req): Json<SuggestionRequest>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    require_user(&req.user_id)?;
    let suggestions = state.suggester.suggest(&req.user_id, req.horizon_days).await?;
    Ok(Json(suggestions))
}

// ── Events ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EventCreate {
    user_id: String,
    title: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    related_ids: Option<HashMap<String, String>>,
}

async fn create_event(
    State(state): State<PlannerState>,
    Json(body): Json<EventCreate>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&body.user_id)?;
    if body.end <= body.start {
        return Err(ApiError::BadRequest("event end must be after start".into()));
    }

    let mut event = Event::new(body.user_id, body.title, body.start, body.end);
    event.color = body.color;
    event.source = body.source;
    event.related_ids = body.related_ids.unwrap_or_default();

    state.db.create_event(&event).await?;
    info!(id = %event.id, user_id = %event.user_id, "Event created");
    Ok(Json(serde_json::json!({"id": event.id})))
}

#[derive(Debug, Deserialize)]
struct EventQuery {
    user_id: String,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

async fn list_events(
    State(state): State<PlannerState>,
    Query(q): Query<EventQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let window = match (q.start, q.end) {
        (Some(start), Some(end)) => Some(TimeWindow { start, end }),
        _ => None,
    };
    let events = state.db.list_events(&q.user_id, window).await?;
    Ok(Json(events))
}

// ── Tasks ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TaskCreate {
    user_id: String,
    title: String,
    #[serde(default)]
    due: Option<DateTime<Utc>>,
    /// Free-form; values other than low/medium/high/urgent are stored as medium.
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    related_ids: Option<HashMap<String, String>>,
}

async fn create_task(
    State(state): State<PlannerState>,
    Json(body): Json<TaskCreate>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(&body.user_id)?;

    let mut task = Task::new(body.user_id, body.title)
        .with_priority(Priority::from_stored(body.priority.as_deref()))
        .with_related_ids(body.related_ids.unwrap_or_default());
    if let Some(due) = body.due {
        task = task.with_due(due);
    }

    state.db.create_task(&task).await?;
    info!(id = %task.id, user_id = %task.user_id, priority = %task.priority, "Task created");
    Ok(Json(serde_json::json!({"id": task.id})))
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    user_id: String,
}

async fn list_tasks(
    State(state): State<PlannerState>,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.db.list_tasks(&q.user_id).await?;
    Ok(Json(tasks))
}

// ── Preferences ─────────────────────────────────────────────────────────

async fn upsert_preferences(
    State(state): State<PlannerState>,
    Json(body): Json<PreferenceUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate().map_err(ApiError::BadRequest)?;

    let outcome = state.db.upsert_preference(&body).await?;
    info!(user_id = %body.user_id, ?outcome, "Preference upserted");
    let resp = match outcome {
        UpsertOutcome::Created => serde_json::json!({"created": true, "id": body.user_id}),
        UpsertOutcome::Updated => serde_json::json!({"updated": true}),
    };
    Ok(Json(resp))
}

/// Returns the stored profile, or the defaults the suggester would use.
async fn get_preferences(
    State(state): State<PlannerState>,
    Path(user_id): Path<String>,
) -> Result<Json<Preference>, ApiError> {
    let pref = state
        .db
        .get_preference(&user_id)
        .await?
        .unwrap_or_else(|| Preference::defaults_for(&user_id));
    Ok(Json(pref))
}
