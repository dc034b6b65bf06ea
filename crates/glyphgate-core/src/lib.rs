//! Glyphgate Core: shared abstractions.
//!
//! This crate defines the types that both sides of the bridge agree on:
//! engine callback values, the client wire protocol, and the seams (clock,
//! outbound sink) that sessions are built against. It contains no
//! infrastructure code.

pub mod clock;
pub mod error;
pub mod protocol;
pub mod sink;
pub mod value;
