//! Values exchanged with the engine across the callback boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A positional argument or return value of an engine callback.
///
/// The engine only ever passes integers, strings, and flat arrays of those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EngineValue {
    /// Absent or null argument.
    Null,
    /// Numeric code (window ids, key codes, coordinates, glyphs).
    Int(i64),
    /// Text (prompts, message lines, typed input).
    Str(String),
    /// Ordered list, used for menu selections.
    Array(Vec<EngineValue>),
}

impl EngineValue {
    /// The neutral value handed back whenever nothing better is known.
    pub const ZERO: Self = Self::Int(0);

    /// Returns the integer payload, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for EngineValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for EngineValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<String> for EngineValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for EngineValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

/// The kind of input an engine callback is waiting for.
///
/// At most one request of each kind may be outstanding per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A keypress or a typed line (`nhgetch`, `yn_function`, `getlin`, ...).
    General,
    /// A keypress that may also carry a map position (`nh_poskey`).
    Position,
    /// The result of a `select_menu` call.
    MenuSelection,
}

impl RequestKind {
    /// All kinds, in the order the registry scans them.
    pub const ALL: [Self; 3] = [Self::General, Self::Position, Self::MenuSelection];
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::General => "general",
            Self::Position => "position",
            Self::MenuSelection => "menu-selection",
        };
        f.write_str(name)
    }
}
