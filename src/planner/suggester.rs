//! Slot suggester — proposes study sessions around a user's calendar.
//!
//! Walks candidate start times forward in fixed steps from the top of the
//! current hour, keeps the ones that satisfy the user's preference profile and
//! do not collide with an event or an earlier proposal, and links each to the
//! highest-priority task in the backlog.

use std::sync::Arc;

use chrono::{DateTime, Datelike, DurationRound, TimeDelta, Timelike, Utc};
use tracing::{debug, info};

use super::model::{Event, Preference, Suggestion, Task};
use crate::config::{MAX_SUGGESTIONS, SuggesterConfig};
use crate::error::PlannerError;
use crate::store::Database;

/// Candidate start times advance by this much.
const STEP_MINUTES: i64 = 30;

/// Dueless tasks sort as if due this far after the snapshot instant.
const UNDATED_TASK_HORIZON_DAYS: i64 = 365;

const GENERIC_TITLE: &str = "Study Session";

/// Half-open `[start, end)` interval blocking further proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BusyInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl BusyInterval {
    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !(end <= self.start || start >= self.end)
    }
}

/// Produces study-session proposals from stored preferences, tasks and events.
pub struct SlotSuggester {
    db: Arc<dyn Database>,
    config: SuggesterConfig,
}

impl SlotSuggester {
    pub fn new(db: Arc<dyn Database>, config: SuggesterConfig) -> Self {
        Self { db, config }
    }

    /// Suggest slots in `[now, now + horizon_days)`.
    pub async fn suggest(
        &self,
        user_id: &str,
        horizon_days: u32,
    ) -> Result<Vec<Suggestion>, PlannerError> {
        self.suggest_at(user_id, horizon_days, Utc::now()).await
    }

    /// Same as [`suggest`](Self::suggest) with an explicit snapshot instant.
    pub async fn suggest_at(
        &self,
        user_id: &str,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Suggestion>, PlannerError> {
        let pref = match self.db.get_preference(user_id).await? {
            Some(pref) => pref,
            None => {
                debug!(user_id = %user_id, "No stored preference, using defaults");
                Preference::defaults_for(user_id)
            }
        };
        let tasks = self.db.list_tasks(user_id).await?;
        let events = self.db.list_events(user_id, None).await?;

        // The walk is CPU-bound and its length grows with the horizon.
        let config = self.config.clone();
        let suggestions = tokio::task::spawn_blocking(move || {
            plan_slots(&pref, tasks, &events, now, horizon_days, &config)
        })
        .await
        .map_err(|e| PlannerError::Worker(e.to_string()))?;
        info!(
            user_id = %user_id,
            horizon_days,
            suggestions = suggestions.len(),
            "Generated slot suggestions"
        );
        Ok(suggestions)
    }
}

/// Compute proposals without touching storage.
///
/// Output is sorted by start, capped at `config.max_suggestions` (never more
/// than [`MAX_SUGGESTIONS`]), and free of overlaps with `events` and with itself.
pub fn plan_slots(
    pref: &Preference,
    tasks: Vec<Task>,
    events: &[Event],
    now: DateTime<Utc>,
    horizon_days: u32,
    config: &SuggesterConfig,
) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    if !admits_any_slot(pref) {
        debug!(user_id = %pref.user_id, "Preference admits no start hour");
        return suggestions;
    }

    let horizon = now
        .checked_add_signed(TimeDelta::days(i64::from(horizon_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let focus = TimeDelta::minutes(i64::from(pref.focus_period_minutes));
    let step = TimeDelta::minutes(STEP_MINUTES);
    let cap = config.max_suggestions.min(MAX_SUGGESTIONS);

    let mut busy: Vec<BusyInterval> = events
        .iter()
        .map(|e| BusyInterval {
            start: e.start,
            end: e.end,
        })
        .collect();

    let tasks = if config.skip_completed {
        tasks.into_iter().filter(|t| !t.completed).collect()
    } else {
        tasks
    };
    let backlog = order_backlog(tasks, now);
    let mut head = 0usize;

    let mut cursor = top_of_hour(now);
    while cursor < horizon && suggestions.len() < cap {
        let Some(slot_end) = cursor.checked_add_signed(focus) else {
            break;
        };

        if within_preferences(cursor, pref) {
            let blocked_until = busy
                .iter()
                .filter(|b| b.overlaps(cursor, slot_end))
                .map(|b| b.end)
                .max();
            if let Some(until) = blocked_until {
                // Every step before `until` overlaps the same interval.
                match first_step_at_or_after(cursor, until, step) {
                    Some(next) => cursor = next,
                    None => break,
                }
                continue;
            }

            let picked = backlog.get(head);
            if config.rotate_tasks && picked.is_some() {
                head += 1;
            }

            let (title, related_task_id) = match picked {
                Some(task) => (format!("Work on: {}", task.title), Some(task.id.to_string())),
                None => (GENERIC_TITLE.to_string(), None),
            };
            suggestions.push(Suggestion {
                user_id: pref.user_id.clone(),
                title,
                start: cursor,
                end: slot_end,
                related_task_id,
                reason: None,
            });
            busy.push(BusyInterval {
                start: cursor,
                end: slot_end,
            });
        }

        match cursor.checked_add_signed(step) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    suggestions
}

/// Whether a slot starting at `at` satisfies weekday, hour window and band.
///
/// Only the start is checked; a slot may run past `latest_hour`.
pub fn within_preferences(at: DateTime<Utc>, pref: &Preference) -> bool {
    let weekday = at.weekday().num_days_from_monday() as u8;
    if !pref.availability_weekdays.is_empty() && !pref.availability_weekdays.contains(&weekday) {
        return false;
    }

    let hour = at.hour();
    if hour < pref.earliest_hour || hour >= pref.latest_hour_bound() {
        return false;
    }

    pref.preferred_time_of_day.is_none_or(|band| band.contains_hour(hour))
}

/// Sort by descending priority rank, then ascending due date.
///
/// The sort is stable, so equal keys keep their storage order.
pub fn order_backlog(mut tasks: Vec<Task>, now: DateTime<Utc>) -> Vec<Task> {
    let undated = now + TimeDelta::days(UNDATED_TASK_HORIZON_DAYS);
    tasks.sort_by(|a, b| {
        b.priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| a.due.unwrap_or(undated).cmp(&b.due.unwrap_or(undated)))
    });
    tasks
}

/// Smallest `cursor + k * step` with `k >= 1` that is not before `until`.
fn first_step_at_or_after(
    cursor: DateTime<Utc>,
    until: DateTime<Utc>,
    step: TimeDelta,
) -> Option<DateTime<Utc>> {
    let gap = until.signed_duration_since(cursor);
    let gap_secs = gap.num_seconds() + i64::from(gap.subsec_nanos() > 0);
    let step_secs = step.num_seconds();
    let steps = ((gap_secs + step_secs - 1) / step_secs).max(1);
    cursor.checked_add_signed(TimeDelta::try_seconds(steps.checked_mul(step_secs)?)?)
}

fn top_of_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at)
}

/// False when no weekday or no hour of the day can ever pass the filter.
fn admits_any_slot(pref: &Preference) -> bool {
    let any_day = pref.availability_weekdays.is_empty()
        || pref.availability_weekdays.iter().any(|d| *d <= 6);
    let any_hour = (pref.earliest_hour..pref.latest_hour_bound())
        .any(|h| pref.preferred_time_of_day.is_none_or(|band| band.contains_hour(h)));
    any_day && any_hour && pref.focus_period_minutes > 0
}
