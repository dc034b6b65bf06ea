//! Last-known render state per map coordinate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use glyphgate_core::protocol::ServerMessage;

/// What was last drawn at one map cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRecord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Opaque glyph id.
    pub glyph: i64,
    /// Display character resolved by the engine.
    pub ch: char,
    /// Display color resolved by the engine.
    pub color: u8,
    /// When the cell was last written.
    pub updated_at: DateTime<Utc>,
}

impl TileRecord {
    /// The tile-update event for this record.
    #[must_use]
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::MapGlyph {
            x: self.x,
            y: self.y,
            glyph: self.glyph,
            ch: self.ch,
            color: self.color,
        }
    }
}

/// Session-scoped tile store. Records are overwritten, never removed.
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<(i32, i32), TileRecord>,
}

impl TileCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a drawn cell, replacing whatever was there, and returns the
    /// tile-update event to forward to the client.
    pub fn write(
        &mut self,
        x: i32,
        y: i32,
        glyph: i64,
        ch: char,
        color: u8,
        now: DateTime<Utc>,
    ) -> ServerMessage {
        let record = TileRecord {
            x,
            y,
            glyph,
            ch,
            color,
            updated_at: now,
        };
        let message = record.to_message();
        self.tiles.insert((x, y), record);
        message
    }

    /// Returns the record at `(x, y)`, if one was ever written.
    #[must_use]
    pub fn read(&self, x: i32, y: i32) -> Option<&TileRecord> {
        self.tiles.get(&(x, y))
    }

    /// Returns every cached record within Chebyshev distance `radius` of the
    /// center, in row-major order.
    #[must_use]
    pub fn read_area(&self, center_x: i32, center_y: i32, radius: u32) -> Vec<&TileRecord> {
        let r = i64::from(radius);
        let mut records: Vec<&TileRecord> = self
            .tiles
            .values()
            .filter(|t| {
                (i64::from(t.x) - i64::from(center_x)).abs() <= r
                    && (i64::from(t.y) - i64::from(center_y)).abs() <= r
            })
            .collect();
        records.sort_by_key(|t| (t.y, t.x));
        records
    }

    /// Answers a single-cell refresh: the cached event or an explicit
    /// "not found".
    #[must_use]
    pub fn refresh(&self, x: i32, y: i32) -> ServerMessage {
        self.read(x, y).map_or(
            ServerMessage::TileNotFound { x, y },
            TileRecord::to_message,
        )
    }

    /// Answers an area refresh with one message per coordinate inside both
    /// the area and the `columns` x `rows` map.
    #[must_use]
    pub fn refresh_area(
        &self,
        center_x: i32,
        center_y: i32,
        radius: u32,
        columns: i32,
        rows: i32,
    ) -> Vec<ServerMessage> {
        let cached: HashMap<(i32, i32), &TileRecord> = self
            .read_area(center_x, center_y, radius)
            .into_iter()
            .map(|t| ((t.x, t.y), t))
            .collect();

        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        let min_x = center_x.saturating_sub(r).max(0);
        let max_x = center_x.saturating_add(r).min(columns - 1);
        let min_y = center_y.saturating_sub(r).max(0);
        let max_y = center_y.saturating_add(r).min(rows - 1);

        let mut messages = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                messages.push(cached.get(&(x, y)).map_or(
                    ServerMessage::TileNotFound { x, y },
                    |t| t.to_message(),
                ));
            }
        }
        messages
    }
}
