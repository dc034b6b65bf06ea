//! Server configuration read from the environment.

use std::str::FromStr;

use chrono::TimeDelta;
use glyphgate_session::config::SessionConfig;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Engine executable, started once per connection.
    pub engine_program: String,
    /// Arguments passed to the engine executable.
    pub engine_args: Vec<String>,
    /// Per-session settings.
    pub session: SessionConfig,
}

impl ServerConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `ENGINE_COMMAND` is missing or any
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `HOST` | `0.0.0.0` |
    /// | `PORT` | `3000` |
    /// | `ENGINE_COMMAND` | required; whitespace-separated program and args |
    /// | `INPUT_COOLDOWN_MS` | `150` |
    /// | `REQUEST_TIMEOUT_SECS` | `0` (no timeout) |
    /// | `INVENTORY_WINDOW` | `4` |
    /// | `MAX_AREA_RADIUS` | `10` |
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `ENGINE_COMMAND` is missing or empty,
    /// or if any numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SessionConfig::default();

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;

        let command = lookup("ENGINE_COMMAND").ok_or_else(|| {
            AppError::Config("ENGINE_COMMAND environment variable must be set".into())
        })?;
        let mut words = command.split_whitespace().map(str::to_owned);
        let engine_program = words
            .next()
            .ok_or_else(|| AppError::Config("ENGINE_COMMAND must not be empty".into()))?;
        let engine_args = words.collect();

        let cooldown_ms = parse_or(&lookup, "INPUT_COOLDOWN_MS", 150_i64)?;
        let timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 0_i64)?;
        let request_timeout = (timeout_secs > 0).then(|| TimeDelta::seconds(timeout_secs));

        let session = SessionConfig {
            input_cooldown: TimeDelta::milliseconds(cooldown_ms),
            request_timeout,
            inventory_window: parse_or(&lookup, "INVENTORY_WINDOW", defaults.inventory_window)?,
            max_area_radius: parse_or(&lookup, "MAX_AREA_RADIUS", defaults.max_area_radius)?,
            ..defaults
        };

        Ok(Self {
            host,
            port,
            engine_program,
            engine_args,
            session,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
    }
}
