//! Recording sink: captures outbound client messages for assertions.

use std::sync::{Arc, Mutex};

use glyphgate_core::protocol::ServerMessage;
use glyphgate_core::sink::ClientSink;

/// A client sink that records every message it is given. Clones share the
/// same record, so a test can keep one clone and hand the other away.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<ServerMessage>>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every message sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<ServerMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Removes and returns every message sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn drain(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl ClientSink for RecordingSink {
    fn send(&self, message: ServerMessage) {
        self.sent.lock().unwrap().push(message);
    }
}
