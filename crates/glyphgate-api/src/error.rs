//! Glyphgate API: error types.

use glyphgate_core::error::SessionError;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// The engine could not be started.
    #[error("engine error: {0}")]
    Engine(#[from] SessionError),
}
