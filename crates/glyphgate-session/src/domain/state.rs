//! Aggregate UI state for one connected client.

use std::collections::HashMap;

use chrono::TimeDelta;

use super::menu::{MenuAccumulator, MenuSelection};
use super::multi_select::MultiSelectTracker;
use super::pending::PendingRequestRegistry;
use super::tile_cache::TileCache;

/// Window types as the engine numbers them in `create_nhwindow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// Message line.
    Message,
    /// Status lines.
    Status,
    /// Dungeon map.
    Map,
    /// Menus, including the inventory display.
    Menu,
    /// Long text.
    Text,
    /// Persistent inventory.
    PermInvent,
    /// A type this bridge does not know.
    Other(i64),
}

impl From<i64> for WindowType {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Message,
            2 => Self::Status,
            3 => Self::Map,
            4 => Self::Menu,
            5 => Self::Text,
            6 => Self::PermInvent,
            other => Self::Other(other),
        }
    }
}

/// Everything the coordinator knows about one session.
///
/// Owned exclusively by one dispatcher and never shared.
#[derive(Debug)]
pub struct SessionState {
    /// Last drawn map cells.
    pub tiles: TileCache,
    /// Menu entries per window.
    pub menus: MenuAccumulator,
    /// Pickup-style selection in progress.
    pub multi_select: MultiSelectTracker,
    /// Suspension points and the latest client input.
    pub requests: PendingRequestRegistry,
    /// Windows created by the engine.
    pub windows: HashMap<i64, WindowType>,
    next_window: i64,
    /// Last prompt or message shown, for heuristic classification.
    pub last_question: Option<String>,
    /// Window whose `end_menu` waits for a selection character.
    pub awaiting_choice: Option<i64>,
    /// Window whose `select_menu` waits for a single selection key.
    pub selecting: Option<i64>,
    /// Single-choice result recorded before the engine asked for it.
    pub menu_choice: Option<MenuSelection>,
    /// The pending yes/no question asks for a direction.
    pub direction_prompt: bool,
}

impl SessionState {
    /// Creates empty state.
    #[must_use]
    pub fn new(inventory_window: i64, input_cooldown: TimeDelta) -> Self {
        Self {
            tiles: TileCache::new(),
            menus: MenuAccumulator::new(inventory_window),
            multi_select: MultiSelectTracker::new(),
            requests: PendingRequestRegistry::new(input_cooldown),
            windows: HashMap::new(),
            next_window: 1,
            last_question: None,
            awaiting_choice: None,
            selecting: None,
            menu_choice: None,
            direction_prompt: false,
        }
    }

    /// Registers a new window and returns its id. Ids start at 1 and are
    /// never reused within a session.
    pub fn create_window(&mut self, kind: WindowType) -> i64 {
        let id = self.next_window;
        self.next_window += 1;
        self.windows.insert(id, kind);
        id
    }

    /// Returns `true` if `window` was created as the message window.
    #[must_use]
    pub fn is_message_window(&self, window: i64) -> bool {
        self.windows.get(&window) == Some(&WindowType::Message)
    }
}
