//! Planner data model — preferences, tasks, calendar events, suggestions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_FOCUS_PERIOD_MINUTES: u32 = 50;
pub const DEFAULT_SHORT_SESSION_MINUTES: u32 = 25;
pub const DEFAULT_EARLIEST_HOUR: u32 = 8;
pub const DEFAULT_LATEST_HOUR: u32 = 22;
pub const DEFAULT_WEEKDAYS: [u8; 5] = [0, 1, 2, 3, 4];

/// Fixed hour-of-day bands a user can restrict study sessions to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Whether `hour` (0..24) falls inside this band.
    pub fn contains_hour(self, hour: u32) -> bool {
        match self {
            Self::Morning => (5..12).contains(&hour),
            Self::Afternoon => (12..17).contains(&hour),
            Self::Evening => (17..22).contains(&hour),
            Self::Night => hour >= 22 || hour < 5,
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Morning => write!(f, "morning"),
            Self::Afternoon => write!(f, "afternoon"),
            Self::Evening => write!(f, "evening"),
            Self::Night => write!(f, "night"),
        }
    }
}

impl std::str::FromStr for TimeOfDay {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Self::Morning),
            "afternoon" => Ok(Self::Afternoon),
            "evening" => Ok(Self::Evening),
            "night" => Ok(Self::Night),
            _ => Err(format!("Unknown time of day: {}", s)),
        }
    }
}

/// A user's scheduling profile. One per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: String,
    /// Length of a proposed slot.
    pub focus_period_minutes: u32,
    pub short_session_minutes: u32,
    #[serde(default)]
    pub preferred_time_of_day: Option<TimeOfDay>,
    /// 0 = Monday .. 6 = Sunday. Empty means every day.
    pub availability_weekdays: Vec<u8>,
    /// Inclusive lower bound on the slot start hour.
    pub earliest_hour: u32,
    /// Exclusive upper bound on the slot start hour. 0 means no upper bound.
    pub latest_hour: u32,
}

impl Preference {
    /// The profile used when a user has never stored one.
    pub fn defaults_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            focus_period_minutes: DEFAULT_FOCUS_PERIOD_MINUTES,
            short_session_minutes: DEFAULT_SHORT_SESSION_MINUTES,
            preferred_time_of_day: None,
            availability_weekdays: DEFAULT_WEEKDAYS.to_vec(),
            earliest_hour: DEFAULT_EARLIEST_HOUR,
            latest_hour: DEFAULT_LATEST_HOUR,
        }
    }

    /// Apply the supplied fields of an update on top of this profile.
    pub fn apply(&mut self, update: &PreferenceUpdate) {
        if let Some(v) = update.focus_period_minutes {
            self.focus_period_minutes = v;
        }
        if let Some(v) = update.short_session_minutes {
            self.short_session_minutes = v;
        }
        if let Some(v) = update.preferred_time_of_day {
            self.preferred_time_of_day = Some(v);
        }
        if let Some(v) = &update.availability_weekdays {
            self.availability_weekdays = v.clone();
        }
        if let Some(v) = update.earliest_hour {
            self.earliest_hour = v;
        }
        if let Some(v) = update.latest_hour {
            self.latest_hour = v;
        }
    }

    /// Effective exclusive upper bound on the start hour.
    pub fn latest_hour_bound(&self) -> u32 {
        if self.latest_hour == 0 { 24 } else { self.latest_hour }
    }
}

/// Partial preference, as sent by clients. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    pub user_id: String,
    #[serde(default)]
    pub focus_period_minutes: Option<u32>,
    #[serde(default)]
    pub short_session_minutes: Option<u32>,
    #[serde(default)]
    pub preferred_time_of_day: Option<TimeOfDay>,
    #[serde(default)]
    pub availability_weekdays: Option<Vec<u8>>,
    #[serde(default)]
    pub earliest_hour: Option<u32>,
    #[serde(default)]
    pub latest_hour: Option<u32>,
}

impl PreferenceUpdate {
    /// Check field ranges. Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user_id must not be empty".into());
        }
        if self.focus_period_minutes == Some(0) {
            return Err("focus_period_minutes must be positive".into());
        }
        if self.short_session_minutes == Some(0) {
            return Err("short_session_minutes must be positive".into());
        }
        if let Some(days) = &self.availability_weekdays {
            if let Some(bad) = days.iter().find(|d| **d > 6) {
                return Err(format!("availability_weekdays entry {bad} is not in 0..=6"));
            }
        }
        for (name, hour) in [
            ("earliest_hour", self.earliest_hour),
            ("latest_hour", self.latest_hour),
        ] {
            if let Some(h) = hour {
                if h >= 24 {
                    return Err(format!("{name} must be in 0..24, got {h}"));
                }
            }
        }
        Ok(())
    }
}

/// Whether an upsert created a new row or changed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Task priority. Ordered so that `Urgent` ranks highest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    /// Decode a stored value; anything unrecognized is `Medium`.
    pub fn from_stored(s: Option<&str>) -> Self {
        s.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Urgent => write!(f, "urgent"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// A backlog item the user wants to spend study time on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub due: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub related_ids: HashMap<String, String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            due: None,
            priority: Priority::Medium,
            related_ids: HashMap::new(),
            completed: false,
            created_at: Utc::now(),
        }
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set due date.
    pub fn with_due(mut self, due: DateTime<Utc>) -> Self {
        self.due = Some(due);
        self
    }

    /// Builder: attach related ids.
    pub fn with_related_ids(mut self, ids: HashMap<String, String>) -> Self {
        self.related_ids = ids;
        self
    }

    /// Builder: mark completed.
    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// A calendar entry. Only its interval matters to the suggester.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Where the event came from, e.g. "teacher-deadline".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub related_ids: HashMap<String, String>,
}

impl Event {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            start,
            end,
            color: None,
            source: None,
            related_ids: HashMap::new(),
        }
    }
}

/// A proposed study session. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub user_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub related_task_id: Option<String>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_defaults() {
        let pref = Preference::defaults_for("u1");
        assert_eq!(pref.focus_period_minutes, 50);
        assert_eq!(pref.short_session_minutes, 25);
        assert_eq!(pref.availability_weekdays, vec![0, 1, 2, 3, 4]);
        assert_eq!(pref.earliest_hour, 8);
        assert_eq!(pref.latest_hour, 22);
        assert!(pref.preferred_time_of_day.is_none());
    }

    #[test]
    fn apply_only_touches_supplied_fields() {
        let mut pref = Preference::defaults_for("u1");
        pref.apply(&PreferenceUpdate {
            user_id: "u1".into(),
            earliest_hour: Some(9),
            preferred_time_of_day: Some(TimeOfDay::Morning),
            ..Default::default()
        });
        assert_eq!(pref.earliest_hour, 9);
        assert_eq!(pref.latest_hour, 22);
        assert_eq!(pref.focus_period_minutes, 50);
        assert_eq!(pref.preferred_time_of_day, Some(TimeOfDay::Morning));
    }

    #[test]
    fn latest_hour_zero_is_unbounded() {
        let mut pref = Preference::defaults_for("u");
        pref.latest_hour = 0;
        assert_eq!(pref.latest_hour_bound(), 24);
    }

    #[test]
    fn update_validation() {
        let ok = PreferenceUpdate {
            user_id: "u".into(),
            availability_weekdays: Some(vec![0, 6]),
            earliest_hour: Some(0),
            latest_hour: Some(23),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_day = PreferenceUpdate {
            user_id: "u".into(),
            availability_weekdays: Some(vec![7]),
            ..Default::default()
        };
        assert!(bad_day.validate().unwrap_err().contains("availability_weekdays"));

        let bad_hour = PreferenceUpdate {
            user_id: "u".into(),
            latest_hour: Some(24),
            ..Default::default()
        };
        assert!(bad_hour.validate().unwrap_err().contains("latest_hour"));

        let zero_focus = PreferenceUpdate {
            user_id: "u".into(),
            focus_period_minutes: Some(0),
            ..Default::default()
        };
        assert!(zero_focus.validate().is_err());

        let no_user = PreferenceUpdate::default();
        assert!(no_user.validate().is_err());
    }

    #[test]
    fn time_of_day_bands() {
        assert!(TimeOfDay::Morning.contains_hour(5));
        assert!(!TimeOfDay::Morning.contains_hour(12));
        assert!(TimeOfDay::Afternoon.contains_hour(16));
        assert!(TimeOfDay::Evening.contains_hour(21));
        assert!(!TimeOfDay::Evening.contains_hour(22));
        assert!(TimeOfDay::Night.contains_hour(23));
        assert!(TimeOfDay::Night.contains_hour(0));
        assert!(TimeOfDay::Night.contains_hour(4));
        assert!(!TimeOfDay::Night.contains_hour(5));
    }

    #[test]
    fn priority_rank_and_fallback() {
        assert!(Priority::Urgent.rank() > Priority::High.rank());
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
        assert_eq!(Priority::from_stored(Some("urgent")), Priority::Urgent);
        assert_eq!(Priority::from_stored(Some("asap")), Priority::Medium);
        assert_eq!(Priority::from_stored(None), Priority::Medium);
    }

    #[test]
    fn priority_serde_snake_case() {
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let parsed: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(parsed, Priority::Low);
    }

    #[test]
    fn suggestion_serializes_null_linkage() {
        let now = Utc::now();
        let s = Suggestion {
            user_id: "u".into(),
            title: "Study Session".into(),
            start: now,
            end: now,
            related_task_id: None,
            reason: None,
        };
        let json = serde_json::to_value(&s).unwrap();
        assert!(json["related_task_id"].is_null());
        assert!(json["reason"].is_null());
    }

    #[test]
    fn task_builder_methods() {
        let due = Utc::now();
        let task = Task::new("u", "Finish essay")
            .with_priority(Priority::Urgent)
            .with_due(due)
            .completed();
        assert_eq!(task.priority, Priority::Urgent);
        assert_eq!(task.due, Some(due));
        assert!(task.completed);
    }
}
