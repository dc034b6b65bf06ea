//! Engine doubles for in-crate tests.

use std::sync::Mutex;

use async_trait::async_trait;
use glyphgate_core::error::SessionError;

use super::coordinator::EngineHandle;
use super::engine::{EngineContext, EngineLauncher, GlyphAppearance};

/// Resolves every glyph to `'@'` in color 7, whatever the glyph number.
pub(crate) struct StubGlyphs;

impl EngineContext for StubGlyphs {
    fn map_glyph(&self, _glyph: i64, _x: i32, _y: i32) -> GlyphAppearance {
        GlyphAppearance { ch: '@', color: 7 }
    }
}

/// Launcher that hands the engine handle back to the test instead of
/// starting an engine, so the test can play the engine's part.
#[derive(Default)]
pub(crate) struct CapturingLauncher {
    handle: Mutex<Option<EngineHandle>>,
    fail: bool,
}

impl CapturingLauncher {
    pub(crate) fn failing() -> Self {
        Self {
            handle: Mutex::new(None),
            fail: true,
        }
    }

    pub(crate) fn take_handle(&self) -> EngineHandle {
        self.handle
            .lock()
            .expect("lock poisoned")
            .take()
            .expect("engine was not launched")
    }
}

#[async_trait]
impl EngineLauncher for CapturingLauncher {
    async fn launch(&self, handle: EngineHandle) -> Result<Box<dyn EngineContext>, SessionError> {
        if self.fail {
            return Err(SessionError::EngineUnavailable("stub refused".to_owned()));
        }
        *self.handle.lock().expect("lock poisoned") = Some(handle);
        Ok(Box::new(StubGlyphs))
    }
}
