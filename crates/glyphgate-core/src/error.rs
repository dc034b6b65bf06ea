//! Session error types.

use thiserror::Error;

use crate::value::RequestKind;

/// Errors raised while coordinating a session.
///
/// None of these are fatal to the engine: the dispatcher recovers from each
/// one locally and answers the engine with a neutral value.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An inbound client message could not be decoded.
    #[error("malformed client message: {0}")]
    MalformedMessage(String),

    /// An engine callback carried an argument of the wrong shape.
    #[error("callback `{callback}` argument {index}: expected {expected}")]
    BadArgument {
        /// The callback name as the engine sent it.
        callback: String,
        /// Zero-based positional index.
        index: usize,
        /// Human-readable description of the expected type.
        expected: &'static str,
    },

    /// A suspension was requested for a kind that already has one.
    #[error("a {0} request is already pending")]
    AlreadyPending(RequestKind),

    /// A menu entry arrived for a window that is not collecting one.
    #[error("no menu is being built on window {0}")]
    MenuNotOpen(i64),

    /// The engine could not be started or stopped talking.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// The session actor or the client connection has gone away.
    #[error("session disconnected")]
    Disconnected,
}
