//! Prompt classification by substring match.
//!
//! The engine does not say what kind of decision a prompt represents, so
//! these functions guess from the free-form prompt text. They are
//! heuristics, not a contract: an unusual prompt can be misclassified, and
//! callers must stay correct (if less convenient) when that happens.

const MULTI_PICK_PHRASES: [&str; 6] = [
    "pick up",
    "pick an object",
    "what would you like to",
    "take out",
    "put in",
    "drop",
];

const DIRECTION_PHRASES: [&str; 2] = ["direction", "which way"];

const POSITION_PHRASES: [&str; 4] = ["where", "pick an object", "select a location", "position"];

fn mentions(text: &str, phrases: &[&str]) -> bool {
    let lower = text.to_lowercase();
    phrases.iter().any(|p| lower.contains(p))
}

/// Guesses whether a menu prompt opens a multi-pick dialog.
#[must_use]
pub fn is_multi_pick(question: &str) -> bool {
    mentions(question, &MULTI_PICK_PHRASES)
}

/// Guesses whether a prompt asks for a direction.
#[must_use]
pub fn is_direction(question: &str) -> bool {
    mentions(question, &DIRECTION_PHRASES)
}

/// Guesses whether the last prompt asks the player to point at the map.
#[must_use]
pub fn wants_position(prompt: &str) -> bool {
    mentions(prompt, &POSITION_PHRASES)
}
