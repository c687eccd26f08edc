//! Integration tests for the planner REST API.
//!
//! Each test spins up an Axum server on a random port backed by an in-memory
//! libSQL store and exercises the real HTTP contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use serde_json::{Value, json};
use tokio::net::TcpListener;

use study_planner::config::SuggesterConfig;
use study_planner::planner::{PlannerState, SlotSuggester, planner_routes};
use study_planner::store::{Database, LibSqlBackend};

/// Start an Axum server on a random port, return its base URL.
async fn start_server() -> String {
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let suggester = SlotSuggester::new(Arc::clone(&db), SuggesterConfig::default());
    let app = planner_routes(PlannerState::new(db, suggester));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn post(base: &str, path: &str, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn suggest(base: &str, user_id: &str, horizon_days: u32) -> Vec<Value> {
    let resp = post(
        base,
        "/suggestions",
        json!({"user_id": user_id, "horizon_days": horizon_days}),
    )
    .await;
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

fn instant(v: &Value) -> DateTime<Utc> {
    v.as_str().unwrap().parse().unwrap()
}

fn assert_no_overlaps(suggestions: &[Value]) {
    let spans: Vec<_> = suggestions
        .iter()
        .map(|s| (instant(&s["start"]), instant(&s["end"])))
        .collect();
    for pair in spans.windows(2) {
        assert!(pair[0].0 <= pair[1].0, "not sorted by start");
        assert!(pair[0].1 <= pair[1].0, "suggestions overlap");
    }
}

#[tokio::test]
async fn health_and_root() {
    let base = start_server().await;

    let health: Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let root: Value = reqwest::get(format!("{base}/")).await.unwrap().json().await.unwrap();
    assert!(root["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn defaults_produce_generic_sessions() {
    let base = start_server().await;
    let out = suggest(&base, "fresh-user", 7).await;

    assert!(!out.is_empty());
    assert!(out.len() <= 20);
    assert_no_overlaps(&out);
    for s in &out {
        assert_eq!(s["user_id"], "fresh-user");
        assert_eq!(s["title"], "Study Session");
        assert!(s["related_task_id"].is_null());
        assert!(s["reason"].is_null());

        let start = instant(&s["start"]);
        assert!((8..22).contains(&start.hour()));
        assert!(start.weekday().num_days_from_monday() <= 4);
        assert_eq!(instant(&s["end"]) - start, TimeDelta::minutes(50));
    }
}

#[tokio::test]
async fn horizon_defaults_to_seven_days() {
    let base = start_server().await;
    let resp = post(&base, "/suggestions", json!({"user_id": "u1"})).await;
    assert_eq!(resp.status(), 200);
    let out: Vec<Value> = resp.json().await.unwrap();
    // Seven days always cover at least four default weekdays of 14 hourly slots.
    assert_eq!(out.len(), 20);
}

#[tokio::test]
async fn urgent_task_heads_every_suggestion() {
    let base = start_server().await;

    let resp = post(
        &base,
        "/tasks",
        json!({"user_id": "u1", "title": "Read chapter", "priority": "low"}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let created: Value = post(
        &base,
        "/tasks",
        json!({"user_id": "u1", "title": "Finish essay", "priority": "urgent"}),
    )
    .await
    .json()
    .await
    .unwrap();
    let urgent_id = created["id"].as_str().unwrap().to_string();

    let out = suggest(&base, "u1", 7).await;
    assert!(!out.is_empty());
    for s in &out {
        assert_eq!(s["title"], "Work on: Finish essay");
        assert_eq!(s["related_task_id"], urgent_id.as_str());
    }
}

#[tokio::test]
async fn events_block_suggestions() {
    let base = start_server().await;
    let now = Utc::now();
    let busy_start = now + TimeDelta::hours(1);
    let busy_end = now + TimeDelta::hours(2);

    // Everyday availability so the blocked hour is always a candidate window.
    post(
        &base,
        "/preferences",
        json!({"user_id": "u1", "availability_weekdays": [0, 1, 2, 3, 4, 5, 6], "earliest_hour": 0, "latest_hour": 0}),
    )
    .await;

    let resp = post(
        &base,
        "/events",
        json!({"user_id": "u1", "title": "Lab", "start": busy_start, "end": busy_end}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let out = suggest(&base, "u1", 1).await;
    assert!(!out.is_empty());
    assert_no_overlaps(&out);
    for s in &out {
        let (start, end) = (instant(&s["start"]), instant(&s["end"]));
        assert!(end <= busy_start || start >= busy_end, "suggestion overlaps event");
    }
}

#[tokio::test]
async fn preference_upsert_flow() {
    let base = start_server().await;

    let created: Value = post(
        &base,
        "/preferences",
        json!({"user_id": "u1", "earliest_hour": 9, "preferred_time_of_day": "morning"}),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(created["created"], true);
    assert_eq!(created["id"], "u1");

    let updated: Value = post(
        &base,
        "/preferences",
        json!({"user_id": "u1", "focus_period_minutes": 30}),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(updated["updated"], true);

    let pref: Value = reqwest::get(format!("{base}/preferences/u1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(pref["earliest_hour"], 9);
    assert_eq!(pref["latest_hour"], 22);
    assert_eq!(pref["focus_period_minutes"], 30);
    assert_eq!(pref["preferred_time_of_day"], "morning");

    let defaults: Value = reqwest::get(format!("{base}/preferences/someone-else"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(defaults["focus_period_minutes"], 50);
    assert!(defaults["preferred_time_of_day"].is_null());

    // Morning band: every suggestion starts in [9, 12).
    let out = suggest(&base, "u1", 7).await;
    assert!(!out.is_empty());
    for s in &out {
        let hour = instant(&s["start"]).hour();
        assert!((9..12).contains(&hour), "hour {hour} outside morning window");
    }
}

#[tokio::test]
async fn invalid_input_rejected() {
    let base = start_server().await;

    let resp = post(&base, "/preferences", json!({"user_id": "u1", "latest_hour": 30})).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");

    let resp = post(
        &base,
        "/preferences",
        json!({"user_id": "u1", "availability_weekdays": [9]}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let now = Utc::now();
    let resp = post(
        &base,
        "/events",
        json!({"user_id": "u1", "title": "Backwards", "start": now, "end": now - TimeDelta::hours(1)}),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = post(&base, "/suggestions", json!({"user_id": "  "})).await;
    assert_eq!(resp.status(), 400);

    let resp = post(&base, "/suggestions", json!({"user_id": "u1", "horizon_days": -1})).await;
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn list_tasks_and_events() {
    let base = start_server().await;
    let now = Utc::now();

    post(
        &base,
        "/tasks",
        json!({"user_id": "u1", "title": "Later", "due": now + TimeDelta::days(3)}),
    )
    .await;
    post(
        &base,
        "/tasks",
        json!({"user_id": "u1", "title": "Sooner", "due": now + TimeDelta::days(1), "related_ids": {"guide": "g-1"}}),
    )
    .await;

    let tasks: Vec<Value> = reqwest::get(format!("{base}/tasks?user_id=u1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<_> = tasks.iter().map(|t| t["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Sooner", "Later"]);
    assert_eq!(tasks[0]["priority"], "medium");
    assert_eq!(tasks[0]["related_ids"]["guide"], "g-1");
    assert_eq!(tasks[0]["completed"], false);

    let day = |d: i64| now + TimeDelta::days(d);
    post(
        &base,
        "/events",
        json!({"user_id": "u1", "title": "Far", "start": day(10), "end": day(10) + TimeDelta::hours(1)}),
    )
    .await;
    post(
        &base,
        "/events",
        json!({"user_id": "u1", "title": "Near", "start": day(1), "end": day(1) + TimeDelta::hours(1), "source": "teacher-deadline"}),
    )
    .await;

    let events: Vec<Value> = reqwest::get(format!("{base}/events?user_id=u1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<_> = events.iter().map(|e| e["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Near", "Far"]);
    assert_eq!(events[0]["source"], "teacher-deadline");

    let start = now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let end = day(5).to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let windowed: Vec<Value> = reqwest::get(format!(
        "{base}/events?user_id=u1&start={start}&end={end}"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0]["title"], "Near");
}

#[tokio::test]
async fn unknown_priority_stored_as_medium() {
    let base = start_server().await;

    let resp = post(
        &base,
        "/tasks",
        json!({"user_id": "u1", "title": "Revise notes", "priority": "asap"}),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let tasks: Vec<Value> = reqwest::get(format!("{base}/tasks?user_id=u1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["priority"], "medium");
}
