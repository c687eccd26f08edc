//! Study planner — calendar-aware study session suggestions.

pub mod model;
pub mod routes;
pub mod suggester;

pub use model::{Event, Preference, PreferenceUpdate, Priority, Suggestion, Task, TimeOfDay};
pub use routes::{PlannerState, planner_routes};
pub use suggester::{SlotSuggester, plan_slots};
