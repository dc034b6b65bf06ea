//! Pickup-style multi-item selection.
//!
//! Item toggles only change the working set. The engine's `select_menu`
//! call is answered on confirm or cancel, whichever of the engine and the
//! client gets there first.

use super::menu::{MenuEntry, MenuSelection};

/// One toggled-on entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRecord {
    /// Key the user pressed.
    pub selector: char,
    /// Engine-supplied selector code.
    pub original_selector: i64,
    /// Position within the menu.
    pub index: usize,
    /// Entry text.
    pub text: String,
}

/// Tracker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiSelectState {
    /// No multi-pick menu is open.
    Idle,
    /// Toggles are being accepted.
    Collecting,
    /// The user accepted; the result waits for `select_menu`.
    Confirmed,
    /// The user cancelled; the empty result waits for `select_menu`.
    Cancelled,
}

/// Result of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The entry joined the selection.
    Added,
    /// The entry left the selection.
    Removed,
    /// Nothing changed (not collecting, or a header).
    Ignored,
}

/// Working set and state machine for one multi-pick menu at a time.
#[derive(Debug)]
pub struct MultiSelectTracker {
    state: MultiSelectState,
    window: Option<i64>,
    selection: Vec<SelectionRecord>,
    ready: Option<MenuSelection>,
}

impl Default for MultiSelectTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiSelectTracker {
    /// Creates an idle tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: MultiSelectState::Idle,
            window: None,
            selection: Vec::new(),
            ready: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MultiSelectState {
        self.state
    }

    /// The menu window being selected from.
    #[must_use]
    pub fn window(&self) -> Option<i64> {
        self.window
    }

    /// Returns `true` while toggles are accepted.
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.state == MultiSelectState::Collecting
    }

    /// Returns `true` if the tracker is handling `window` in any non-idle
    /// state.
    #[must_use]
    pub fn owns(&self, window: i64) -> bool {
        self.state != MultiSelectState::Idle && self.window == Some(window)
    }

    /// Entries toggled on so far.
    #[must_use]
    pub fn selection(&self) -> &[SelectionRecord] {
        &self.selection
    }

    /// Begins collecting for `window`, discarding any previous state.
    pub fn start(&mut self, window: i64) {
        self.reset();
        self.state = MultiSelectState::Collecting;
        self.window = Some(window);
    }

    /// Adds `entry` if absent, removes it if present.
    pub fn toggle(&mut self, entry: &MenuEntry) -> Toggle {
        if !self.is_collecting() || entry.is_category {
            return Toggle::Ignored;
        }
        let Some(selector) = entry.selector else {
            return Toggle::Ignored;
        };
        if let Some(pos) = self.selection.iter().position(|r| r.index == entry.index) {
            self.selection.remove(pos);
            return Toggle::Removed;
        }
        self.selection.push(SelectionRecord {
            selector,
            original_selector: entry.original_selector,
            index: entry.index,
            text: entry.text.clone(),
        });
        Toggle::Added
    }

    /// Accepts the working set. Returns the selection in menu order and
    /// clears the working set.
    pub fn confirm(&mut self) -> MenuSelection {
        let mut chosen = std::mem::take(&mut self.selection);
        chosen.sort_by_key(|r| r.index);
        self.state = MultiSelectState::Confirmed;
        MenuSelection {
            selectors: chosen.into_iter().map(|r| r.original_selector).collect(),
        }
    }

    /// Abandons the working set.
    pub fn cancel(&mut self) -> MenuSelection {
        self.selection.clear();
        self.state = MultiSelectState::Cancelled;
        MenuSelection::empty()
    }

    /// Holds a confirmed or cancelled result until the engine asks for it.
    pub fn park(&mut self, selection: MenuSelection) {
        self.ready = Some(selection);
    }

    /// Hands over a parked result and returns to idle.
    pub fn take_ready(&mut self) -> Option<MenuSelection> {
        let ready = self.ready.take()?;
        self.reset();
        Some(ready)
    }

    /// Back to idle with nothing selected.
    pub fn reset(&mut self) {
        self.state = MultiSelectState::Idle;
        self.window = None;
        self.selection.clear();
        self.ready = None;
    }
}
