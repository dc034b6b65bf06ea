//! Session application layer: callback decoding, dispatch, and the
//! per-session task that serializes engine calls and client frames.

pub mod callbacks;
pub mod coordinator;
pub mod dispatcher;
pub mod engine;

#[cfg(test)]
pub(crate) mod test_engine;
