//! Study planner — availability-aware study session suggestions.

pub mod config;
pub mod error;
pub mod planner;
pub mod server;
pub mod store;
