//! Glyphgate: Session Coordinator.
//!
//! Bridges the engine's named, synchronous UI callbacks to a client that
//! only speaks asynchronous messages. One coordinator instance exists per
//! connected client and owns all of that client's UI state.

pub mod application;
pub mod config;
pub mod domain;
