//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// Server configuration, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Slot suggestion tuning.
    pub suggester: SuggesterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: PathBuf::from("./data/study-planner.db"),
            suggester: SuggesterConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// `STUDY_PLANNER_PORT` wins over the generic `PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match env_parse::<u16>("STUDY_PLANNER_PORT")? {
            Some(p) => p,
            None => env_parse::<u16>("PORT")?.unwrap_or(defaults.port),
        };

        let db_path = std::env::var("STUDY_PLANNER_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        Ok(Self {
            port,
            db_path,
            suggester: SuggesterConfig::from_env()?,
        })
    }
}

/// Hard ceiling on suggestions per call. Configuration may only lower it.
pub const MAX_SUGGESTIONS: usize = 20;

/// Tuning for the slot suggester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggesterConfig {
    /// Upper bound on suggestions returned per call, at most [`MAX_SUGGESTIONS`].
    pub max_suggestions: usize,
    /// Advance to the next task for every accepted slot instead of reusing the head.
    pub rotate_tasks: bool,
    /// Drop completed tasks before ordering the backlog.
    pub skip_completed: bool,
}

impl Default for SuggesterConfig {
    fn default() -> Self {
        Self {
            max_suggestions: MAX_SUGGESTIONS,
            rotate_tasks: false,
            skip_completed: false,
        }
    }
}

impl SuggesterConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let max_suggestions = match env_parse::<usize>("STUDY_PLANNER_MAX_SUGGESTIONS")? {
            Some(n) => check_max_suggestions(n)?,
            None => defaults.max_suggestions,
        };

        Ok(Self {
            max_suggestions,
            rotate_tasks: env_flag("STUDY_PLANNER_ROTATE_TASKS")?.unwrap_or(defaults.rotate_tasks),
            skip_completed: env_flag("STUDY_PLANNER_SKIP_COMPLETED")?
                .unwrap_or(defaults.skip_completed),
        })
    }
}

fn check_max_suggestions(n: usize) -> Result<usize, ConfigError> {
    if n == 0 || n > MAX_SUGGESTIONS {
        return Err(ConfigError::InvalidValue {
            key: "STUDY_PLANNER_MAX_SUGGESTIONS".into(),
            message: format!("must be in 1..={MAX_SUGGESTIONS}, got {n}"),
        });
    }
    Ok(n)
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

fn env_flag(key: &str) -> Result<Option<bool>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw).map(Some).ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {raw:?}"),
        }),
        Err(_) => Ok(None),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
