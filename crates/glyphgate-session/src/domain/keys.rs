//! Client input decoding.
//!
//! Clients send keypresses as strings: either the typed character itself or
//! a DOM-style key name such as `ArrowUp`. The engine only understands
//! integer key codes.

/// ASCII escape, returned for cancel and used as the safe default.
pub const ESCAPE: i64 = 27;

/// Carriage return.
pub const ENTER: i64 = 13;

/// Key names that move the hero, mapped to the engine's movement letters.
const MOVEMENT_KEYS: [(&str, char); 8] = [
    ("ArrowLeft", 'h'),
    ("ArrowDown", 'j'),
    ("ArrowUp", 'k'),
    ("ArrowRight", 'l'),
    ("Home", 'y'),
    ("PageUp", 'u'),
    ("End", 'b'),
    ("PageDown", 'n'),
];

/// Translates arrow and navigation key names to movement letters.
#[must_use]
pub fn movement_key(raw: &str) -> Option<char> {
    MOVEMENT_KEYS
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, key)| *key)
}

/// Returns `true` for the cancel signal.
#[must_use]
pub fn is_cancel(raw: &str) -> bool {
    matches!(raw, "Escape" | "Esc" | "\u{1b}")
}

/// Returns `true` for the accept signal that confirms a multi-pick menu.
#[must_use]
pub fn is_confirm(raw: &str) -> bool {
    matches!(raw, "Enter" | "\n" | "\r")
}

/// Decodes raw client input into the key code the engine expects.
///
/// Empty input decodes to 0.
#[must_use]
pub fn decode_key(raw: &str) -> i64 {
    if raw.is_empty() {
        return 0;
    }
    if is_cancel(raw) {
        return ESCAPE;
    }
    if raw == "Enter" {
        return ENTER;
    }
    let key = movement_key(raw).or_else(|| raw.chars().next());
    key.map_or(0, |c| i64::from(u32::from(c)))
}

/// Converts an engine key code back into a character, if printable.
#[must_use]
pub fn key_char(code: i64) -> Option<char> {
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .filter(|c| !c.is_control())
}
