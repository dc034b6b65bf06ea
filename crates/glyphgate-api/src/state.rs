//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;

use glyphgate_core::clock::Clock;
use glyphgate_session::application::engine::EngineLauncher;
use glyphgate_session::config::SessionConfig;

/// Application state shared across all connections.
#[derive(Clone)]
pub struct AppState {
    /// Settings every new session starts with.
    pub session_config: Arc<SessionConfig>,
    /// Time source for cooldowns and timeouts.
    pub clock: Arc<dyn Clock>,
    /// Starts one engine per connection.
    pub launcher: Arc<dyn EngineLauncher>,
    /// Sessions currently running.
    pub active_sessions: Arc<AtomicUsize>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        session_config: SessionConfig,
        clock: Arc<dyn Clock>,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Self {
        Self {
            session_config: Arc::new(session_config),
            clock,
            launcher,
            active_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }
}
