//! Client wire protocol.
//!
//! Every message is a JSON object with a `type` tag. Field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// One menu entry as shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemPayload {
    /// Display text.
    pub text: String,
    /// Selector the user presses; `None` for category headers.
    pub accelerator: Option<char>,
    /// Selector code the engine originally supplied.
    pub original_accelerator: i64,
    /// Owning window id.
    pub window: i64,
    /// Glyph shown next to the entry.
    pub glyph: i64,
    /// `true` for non-selectable group headers.
    pub is_category: bool,
    /// Position within the current menu.
    pub menu_index: usize,
}

/// Messages sent from the coordinator to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A map cell was drawn.
    MapGlyph {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Opaque glyph id.
        glyph: i64,
        /// Resolved display character.
        #[serde(rename = "char")]
        ch: char,
        /// Resolved display color.
        color: u8,
    },
    /// A line of message or raw text.
    Text {
        /// The text.
        text: String,
    },
    /// A prompt that needs an answer.
    Question {
        /// Prompt text.
        text: String,
        /// Allowed answers, as the engine listed them.
        choices: String,
        /// Default answer.
        default: String,
        /// Menu entries, when the question is a menu prompt.
        #[serde(rename = "menuItems")]
        menu_items: Vec<MenuItemPayload>,
    },
    /// A selectable entry was added to the menu being built.
    MenuItem {
        /// Entry text.
        text: String,
        /// Entry selector.
        accelerator: Option<char>,
        /// Entries accumulated so far on this window.
        #[serde(rename = "menuItems")]
        menu_items: Vec<MenuItemPayload>,
    },
    /// The engine wants a map position.
    PositionRequest {
        /// Prompt text.
        text: String,
    },
    /// The engine wants a typed line.
    NameRequest {
        /// Prompt text.
        text: String,
        /// Longest accepted answer.
        #[serde(rename = "maxLength")]
        max_length: usize,
    },
    /// The view should center on the hero.
    PlayerPosition {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// Passive inventory refresh.
    InventoryUpdate {
        /// Current inventory listing.
        items: Vec<MenuItemPayload>,
    },
    /// Nothing is cached for the requested coordinate.
    TileNotFound {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
}

/// Messages sent from the client to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A keypress or a typed string.
    Input {
        /// Raw input as the client captured it.
        input: String,
    },
    /// Resend one map cell.
    RequestTileUpdate {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// Resend every map cell around a center.
    RequestAreaUpdate {
        /// Center column.
        #[serde(rename = "centerX")]
        center_x: i32,
        /// Center row.
        #[serde(rename = "centerY")]
        center_y: i32,
        /// Chebyshev radius.
        radius: u32,
    },
}

impl ClientMessage {
    /// Decodes a text frame received from the client.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MalformedMessage` if the frame is not a known
    /// message shape.
    pub fn parse(frame: &str) -> Result<Self, SessionError> {
        serde_json::from_str(frame).map_err(|e| SessionError::MalformedMessage(e.to_string()))
    }
}
