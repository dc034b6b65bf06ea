//! Per-session tuning knobs.

use std::time::Duration;

use chrono::TimeDelta;

/// Configuration shared by every session the server starts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long buffered client input may still answer a request.
    pub input_cooldown: TimeDelta,
    /// Pending requests older than this resolve with a safe default.
    /// `None` waits forever.
    pub request_timeout: Option<TimeDelta>,
    /// Window id the engine uses for the inventory display.
    pub inventory_window: i64,
    /// Largest radius honored for area refreshes.
    pub max_area_radius: u32,
    /// Map width in cells.
    pub map_columns: i32,
    /// Map height in cells.
    pub map_rows: i32,
    /// Longest accepted character name.
    pub max_name_length: usize,
    /// Longest accepted `getlin` answer.
    pub max_line_length: usize,
    /// How often the session loop checks for expired requests.
    pub tick_interval: Duration,
    /// Buffer size of the engine and client channels.
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            input_cooldown: TimeDelta::milliseconds(150),
            request_timeout: None,
            inventory_window: 4,
            max_area_radius: 10,
            map_columns: 80,
            map_rows: 21,
            max_name_length: 31,
            max_line_length: 255,
            tick_interval: Duration::from_millis(250),
            channel_capacity: 64,
        }
    }
}
