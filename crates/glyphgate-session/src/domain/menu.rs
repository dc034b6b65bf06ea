//! Menu accumulation between `start_menu` and `end_menu`.

use std::collections::HashMap;

use glyphgate_core::error::SessionError;
use glyphgate_core::protocol::MenuItemPayload;
use glyphgate_core::value::EngineValue;

use tracing::warn;

use super::keys;

/// Selectors handed out when the engine supplies an unusable one.
const SYNTHETIC_SELECTORS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Tried once every letter is taken.
const OVERFLOW_SELECTORS: &[u8; 10] = b"0123456789";

/// One accumulated menu line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    /// Display text.
    pub text: String,
    /// Key the user presses; `None` for category headers.
    pub selector: Option<char>,
    /// Selector code the engine supplied, possibly invalid.
    pub original_selector: i64,
    /// Owning window.
    pub window: i64,
    /// Glyph shown beside the entry.
    pub glyph: i64,
    /// Engine-side item identifier, carried through untouched.
    pub identifier: i64,
    /// `true` for non-selectable group headers.
    pub is_category: bool,
    /// Position within the menu.
    pub index: usize,
}

impl MenuEntry {
    /// Wire representation.
    #[must_use]
    pub fn to_payload(&self) -> MenuItemPayload {
        MenuItemPayload {
            text: self.text.clone(),
            accelerator: self.selector,
            original_accelerator: self.original_selector,
            window: self.window,
            glyph: self.glyph,
            is_category: self.is_category,
            menu_index: self.index,
        }
    }
}

/// What `end_menu` should do with the accumulated entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Informational inventory refresh; the engine must not block.
    Passive {
        /// Entries to publish.
        entries: Vec<MenuEntry>,
    },
    /// A real decision point; the user must answer.
    Prompt {
        /// Prompt text, if the engine gave one.
        question: Option<String>,
        /// Entries to show alongside the prompt.
        entries: Vec<MenuEntry>,
    },
    /// Nothing to show.
    Empty,
}

/// Result of a `select_menu` call: the original selector codes of the
/// chosen entries, in menu order. Its length is the selection count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuSelection {
    /// Engine-supplied selector codes.
    pub selectors: Vec<i64>,
}

impl MenuSelection {
    /// A selection of nothing (cancel, timeout, disconnect).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A selection of a single entry.
    #[must_use]
    pub fn single(entry: &MenuEntry) -> Self {
        Self {
            selectors: vec![entry.original_selector],
        }
    }

    /// Number of chosen entries.
    #[must_use]
    pub fn count(&self) -> usize {
        self.selectors.len()
    }

    /// Engine-facing value.
    #[must_use]
    pub fn into_value(self) -> EngineValue {
        EngineValue::Array(self.selectors.into_iter().map(EngineValue::Int).collect())
    }
}

/// Returns `true` if the engine's selector code means "group header".
fn is_category_code(code: Option<i64>) -> bool {
    matches!(code, None | Some(0 | 32))
}

/// Collects menu entries per window. Only one window collects at a time.
#[derive(Debug)]
pub struct MenuAccumulator {
    menus: HashMap<i64, Vec<MenuEntry>>,
    active: Option<i64>,
    inventory_window: i64,
}

impl MenuAccumulator {
    /// Creates an accumulator that treats `inventory_window` as the
    /// inventory display.
    #[must_use]
    pub fn new(inventory_window: i64) -> Self {
        Self {
            menus: HashMap::new(),
            active: None,
            inventory_window,
        }
    }

    /// Starts a new menu on `window`, discarding its previous entries.
    pub fn begin(&mut self, window: i64) {
        self.menus.insert(window, Vec::new());
        self.active = Some(window);
    }

    /// Adds an entry to the menu being built on `window`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MenuNotOpen` if `window` is not the window
    /// currently collecting.
    pub fn add(
        &mut self,
        window: i64,
        glyph: i64,
        identifier: i64,
        selector: Option<i64>,
        text: &str,
    ) -> Result<&MenuEntry, SessionError> {
        if self.active != Some(window) {
            return Err(SessionError::MenuNotOpen(window));
        }
        let entries = self.menus.entry(window).or_default();

        let original_selector = selector.unwrap_or(0);
        let assigned = if is_category_code(selector) {
            None
        } else {
            assign_selector(entries, original_selector)
        };
        let is_category = assigned.is_none();
        if is_category && !is_category_code(selector) {
            warn!(window, text, "no selector left; entry shown as unselectable");
        }

        let index = entries.len();
        entries.push(MenuEntry {
            text: text.to_owned(),
            selector: assigned,
            original_selector,
            window,
            glyph,
            identifier,
            is_category,
            index,
        });
        Ok(&entries[index])
    }

    /// Closes the menu on `window` and decides how it should be presented.
    ///
    /// Entries stay available for selection lookups until the window's next
    /// `begin`.
    pub fn end(&mut self, window: i64, question: Option<&str>) -> MenuOutcome {
        if self.active == Some(window) {
            self.active = None;
        }
        let question = question.map(str::trim).filter(|q| !q.is_empty());
        let entries = self.entries(window);
        let inventory = self.is_inventory(window);

        if inventory && question.is_none() {
            return MenuOutcome::Passive {
                entries: entries.to_vec(),
            };
        }
        let has_selectable = entries.iter().any(|e| !e.is_category);
        if question.is_some() || (has_selectable && !inventory) {
            return MenuOutcome::Prompt {
                question: question.map(str::to_owned),
                entries: entries.to_vec(),
            };
        }
        MenuOutcome::Empty
    }

    /// Entries accumulated for `window`.
    #[must_use]
    pub fn entries(&self, window: i64) -> &[MenuEntry] {
        self.menus.get(&window).map_or(&[], Vec::as_slice)
    }

    /// The selectable entry on `window` bound to `key`.
    #[must_use]
    pub fn find_selectable(&self, window: i64, key: char) -> Option<&MenuEntry> {
        self.entries(window)
            .iter()
            .find(|e| !e.is_category && e.selector == Some(key))
    }

    /// Returns `true` if `window` is the inventory display.
    #[must_use]
    pub fn is_inventory(&self, window: i64) -> bool {
        window == self.inventory_window
    }
}

/// Letters, digits, and the few punctuation selectors the engine uses for
/// gold and special entries.
fn is_usable_selector(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '$' | '-' | '#')
}

/// Picks the selector for a new selectable entry: the engine's code when it
/// is usable and free, otherwise the first free letter starting at the count
/// of selectable entries so far and wrapping around, then the first free
/// digit. `None` once all of those are taken.
fn assign_selector(existing: &[MenuEntry], code: i64) -> Option<char> {
    let taken = |c: char| existing.iter().any(|e| e.selector == Some(c));

    if let Some(c) = keys::key_char(code).filter(|c| is_usable_selector(*c) && !taken(*c)) {
        return Some(c);
    }

    let start = existing.iter().filter(|e| !e.is_category).count() % SYNTHETIC_SELECTORS.len();
    SYNTHETIC_SELECTORS[start..]
        .iter()
        .chain(&SYNTHETIC_SELECTORS[..start])
        .chain(OVERFLOW_SELECTORS)
        .map(|b| char::from(*b))
        .find(|c| !taken(*c))
}
