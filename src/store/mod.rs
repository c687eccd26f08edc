//! Persistence layer — libSQL-backed storage for preferences, tasks and events.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, TimeWindow};
