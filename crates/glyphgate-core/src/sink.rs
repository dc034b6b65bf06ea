//! Outbound message sink.

use crate::protocol::ServerMessage;

/// Destination for messages addressed to the connected client.
///
/// Sending never blocks and never fails from the caller's point of view:
/// if the client is gone the message is dropped, and the disconnect is
/// handled by the session loop.
pub trait ClientSink: Send {
    /// Queues one message for delivery.
    fn send(&self, message: ServerMessage);
}
