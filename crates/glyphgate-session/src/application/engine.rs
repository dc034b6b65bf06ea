//! Seams to the engine collaborator.

use async_trait::async_trait;
use glyphgate_core::error::SessionError;

use super::coordinator::EngineHandle;

/// How the engine wants a glyph drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphAppearance {
    /// Display character.
    pub ch: char,
    /// Display color.
    pub color: u8,
}

/// The engine's invocation context, injected into each dispatcher.
///
/// Glyph resolution belongs to the engine; the coordinator never recomputes
/// it, it only asks.
pub trait EngineContext: Send {
    /// Resolves `glyph` drawn at `(x, y)` to its display appearance.
    fn map_glyph(&self, glyph: i64, x: i32, y: i32) -> GlyphAppearance;
}

/// Starts one engine instance per session.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Starts an engine that issues its callbacks through `handle` and
    /// returns the context the session's dispatcher will consult.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EngineUnavailable` if the engine cannot start.
    async fn launch(&self, handle: EngineHandle) -> Result<Box<dyn EngineContext>, SessionError>;
}
