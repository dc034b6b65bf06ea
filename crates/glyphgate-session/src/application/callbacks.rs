//! Typed engine callbacks.
//!
//! The engine calls out by name with a positional argument list. Each call
//! is decoded exactly once, here, into an [`EngineCallback`] variant with
//! named fields; handlers never see raw positional arguments.

use glyphgate_core::error::SessionError;
use glyphgate_core::value::EngineValue;

use super::engine::GlyphAppearance;
use crate::domain::state::WindowType;

/// Callbacks that need no state and always answer 0.
const NEUTRAL_CALLBACKS: [&str; 20] = [
    "init_nhwindows",
    "exit_nhwindows",
    "curs",
    "get_nh_event",
    "delay_output",
    "mark_synch",
    "wait_synch",
    "nhbell",
    "number_pad",
    "status_init",
    "status_enablefield",
    "status_update",
    "player_selection",
    "suspend_nhwindow",
    "resume_nhwindow",
    "preference_update",
    "getmsghistory",
    "putmsghistory",
    "display_file",
    "outrip",
];

/// Window operations that need no bookkeeping beyond logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    /// `display_nhwindow`
    Display,
    /// `clear_nhwindow`
    Clear,
    /// `destroy_nhwindow`
    Destroy,
}

/// Selection mode passed to `select_menu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectHow {
    /// Display only.
    None,
    /// Exactly one entry.
    One,
    /// Zero or more entries.
    Any,
}

impl From<i64> for SelectHow {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::One,
            2 => Self::Any,
            _ => Self::None,
        }
    }
}

/// One decoded engine callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCallback {
    /// `create_nhwindow(type)`
    CreateWindow {
        /// Requested window type.
        kind: WindowType,
    },
    /// `display_nhwindow` / `clear_nhwindow` / `destroy_nhwindow`
    Window {
        /// Which operation.
        op: WindowOp,
        /// Target window.
        window: i64,
    },
    /// `putstr(win, attr, text)`
    PutStr {
        /// Target window.
        window: i64,
        /// Line of text.
        text: String,
    },
    /// `raw_print(text)` / `raw_print_bold(text)`
    RawPrint {
        /// Line of text.
        text: String,
    },
    /// `print_glyph(win, x, y, glyph[, char, color])`
    PrintGlyph {
        /// Target window.
        window: i64,
        /// Column.
        x: i32,
        /// Row.
        y: i32,
        /// Opaque glyph id.
        glyph: i64,
        /// Appearance, when the engine already resolved it.
        resolved: Option<GlyphAppearance>,
    },
    /// `cliparound(x, y)`
    Cliparound {
        /// Column.
        x: i32,
        /// Row.
        y: i32,
    },
    /// `update_inventory()`
    UpdateInventory,
    /// `nhgetch()`
    GetKey,
    /// `nh_poskey(x, y, mod)`
    GetPositionKey,
    /// `yn_function(question, choices, default)`
    YesNo {
        /// Prompt text.
        question: String,
        /// Allowed answers.
        choices: String,
        /// Default answer.
        default: String,
    },
    /// `getlin(prompt)`
    GetLine {
        /// Prompt text.
        prompt: String,
    },
    /// `askname()`
    AskName,
    /// `start_menu(win[, behavior])`
    StartMenu {
        /// Target window.
        window: i64,
    },
    /// `add_menu(win, glyph, identifier, selector, group, attr, color, text, flags)`
    AddMenu {
        /// Target window.
        window: i64,
        /// Glyph beside the entry.
        glyph: i64,
        /// Engine-side identifier.
        identifier: i64,
        /// Selector code; `None` when absent.
        selector: Option<i64>,
        /// Entry text.
        text: String,
    },
    /// `end_menu(win, prompt)`
    EndMenu {
        /// Target window.
        window: i64,
        /// Prompt, if any.
        prompt: Option<String>,
    },
    /// `select_menu(win, how)`
    SelectMenu {
        /// Target window.
        window: i64,
        /// Selection mode.
        how: SelectHow,
    },
    /// A known callback with nothing to do.
    Neutral {
        /// Callback name.
        name: &'static str,
    },
    /// A callback this bridge does not implement.
    Unknown {
        /// Callback name as received.
        name: String,
    },
}

impl EngineCallback {
    /// Decodes a named callback and its positional arguments. A leading
    /// `shim_` on the name is ignored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::BadArgument` when a required argument is
    /// missing or has the wrong type.
    pub fn decode(name: &str, args: &[EngineValue]) -> Result<Self, SessionError> {
        let name = name.strip_prefix("shim_").unwrap_or(name);
        let a = Args { name, values: args };

        let callback = match name {
            "create_nhwindow" => Self::CreateWindow {
                kind: WindowType::from(a.int(0)?),
            },
            "display_nhwindow" => a.window_op(WindowOp::Display)?,
            "clear_nhwindow" => a.window_op(WindowOp::Clear)?,
            "destroy_nhwindow" => a.window_op(WindowOp::Destroy)?,
            "putstr" => Self::PutStr {
                window: a.int(0)?,
                text: a.string(2)?,
            },
            "raw_print" | "raw_print_bold" => Self::RawPrint { text: a.string(0)? },
            "print_glyph" => Self::PrintGlyph {
                window: a.int(0)?,
                x: a.coord(1)?,
                y: a.coord(2)?,
                glyph: a.int(3)?,
                resolved: a.appearance(4)?,
            },
            "cliparound" => Self::Cliparound {
                x: a.coord(0)?,
                y: a.coord(1)?,
            },
            "update_inventory" => Self::UpdateInventory,
            "nhgetch" => Self::GetKey,
            "nh_poskey" => Self::GetPositionKey,
            "yn_function" => Self::YesNo {
                question: a.string(0)?,
                choices: a.opt_string(1)?.unwrap_or_default(),
                default: a.opt_char_string(2)?,
            },
            "getlin" => Self::GetLine { prompt: a.string(0)? },
            "askname" => Self::AskName,
            "start_menu" => Self::StartMenu { window: a.int(0)? },
            "add_menu" => Self::AddMenu {
                window: a.int(0)?,
                glyph: a.opt_int(1)?.unwrap_or(0),
                identifier: a.opt_int(2)?.unwrap_or(0),
                selector: a.opt_int(3)?,
                text: a.opt_string(7)?.unwrap_or_default(),
            },
            "end_menu" => Self::EndMenu {
                window: a.int(0)?,
                prompt: a.opt_string(1)?,
            },
            "select_menu" => Self::SelectMenu {
                window: a.int(0)?,
                how: SelectHow::from(a.opt_int(1)?.unwrap_or(0)),
            },
            other => match NEUTRAL_CALLBACKS.iter().find(|n| **n == other) {
                Some(name) => Self::Neutral { name: *name },
                None => Self::Unknown {
                    name: other.to_owned(),
                },
            },
        };
        Ok(callback)
    }

    /// Callback name for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::CreateWindow { .. } => "create_nhwindow",
            Self::Window { op, .. } => match op {
                WindowOp::Display => "display_nhwindow",
                WindowOp::Clear => "clear_nhwindow",
                WindowOp::Destroy => "destroy_nhwindow",
            },
            Self::PutStr { .. } => "putstr",
            Self::RawPrint { .. } => "raw_print",
            Self::PrintGlyph { .. } => "print_glyph",
            Self::Cliparound { .. } => "cliparound",
            Self::UpdateInventory => "update_inventory",
            Self::GetKey => "nhgetch",
            Self::GetPositionKey => "nh_poskey",
            Self::YesNo { .. } => "yn_function",
            Self::GetLine { .. } => "getlin",
            Self::AskName => "askname",
            Self::StartMenu { .. } => "start_menu",
            Self::AddMenu { .. } => "add_menu",
            Self::EndMenu { .. } => "end_menu",
            Self::SelectMenu { .. } => "select_menu",
            Self::Neutral { name } => *name,
            Self::Unknown { name } => name.as_str(),
        }
    }
}

/// Positional argument accessors that report the failing index.
struct Args<'a> {
    name: &'a str,
    values: &'a [EngineValue],
}

impl Args<'_> {
    fn bad(&self, index: usize, expected: &'static str) -> SessionError {
        SessionError::BadArgument {
            callback: self.name.to_owned(),
            index,
            expected,
        }
    }

    fn get(&self, index: usize) -> &EngineValue {
        self.values.get(index).unwrap_or(&EngineValue::Null)
    }

    fn int(&self, index: usize) -> Result<i64, SessionError> {
        self.get(index)
            .as_int()
            .ok_or_else(|| self.bad(index, "integer"))
    }

    fn opt_int(&self, index: usize) -> Result<Option<i64>, SessionError> {
        match self.get(index) {
            EngineValue::Null => Ok(None),
            EngineValue::Int(n) => Ok(Some(*n)),
            _ => Err(self.bad(index, "integer or null")),
        }
    }

    fn coord(&self, index: usize) -> Result<i32, SessionError> {
        i32::try_from(self.int(index)?).map_err(|_| self.bad(index, "32-bit coordinate"))
    }

    fn string(&self, index: usize) -> Result<String, SessionError> {
        self.get(index)
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.bad(index, "string"))
    }

    fn opt_string(&self, index: usize) -> Result<Option<String>, SessionError> {
        match self.get(index) {
            EngineValue::Null => Ok(None),
            EngineValue::Str(s) => Ok(Some(s.clone())),
            _ => Err(self.bad(index, "string or null")),
        }
    }

    /// A single character given either as a string or as a code point.
    fn opt_char(&self, index: usize) -> Result<Option<char>, SessionError> {
        match self.get(index) {
            EngineValue::Null => Ok(None),
            EngineValue::Str(s) => Ok(s.chars().next()),
            EngineValue::Int(code) => Ok(u32::try_from(*code).ok().and_then(char::from_u32)),
            EngineValue::Array(_) => Err(self.bad(index, "character")),
        }
    }

    fn opt_char_string(&self, index: usize) -> Result<String, SessionError> {
        Ok(self
            .opt_char(index)?
            .filter(|c| *c != '\0')
            .map(String::from)
            .unwrap_or_default())
    }

    fn appearance(&self, index: usize) -> Result<Option<GlyphAppearance>, SessionError> {
        let Some(ch) = self.opt_char(index)? else {
            return Ok(None);
        };
        let color = self.opt_int(index + 1)?.unwrap_or(0);
        let color = u8::try_from(color).map_err(|_| self.bad(index + 1, "color 0-255"))?;
        Ok(Some(GlyphAppearance { ch, color }))
    }

    fn window_op(&self, op: WindowOp) -> Result<EngineCallback, SessionError> {
        Ok(EngineCallback::Window {
            op,
            window: self.int(0)?,
        })
    }
}
