//! The per-session task.
//!
//! A [`Session`] owns one [`Dispatcher`] and is the only thing that touches
//! it. Engine calls arrive over an mpsc channel from [`EngineHandle`]s,
//! client frames over another, and a periodic tick drives request
//! timeouts. The select loop runs each message to completion before the
//! next, which gives the single-threaded ordering the session state needs.

use std::sync::Arc;
use std::time::Duration;

use glyphgate_core::clock::Clock;
use glyphgate_core::error::SessionError;
use glyphgate_core::protocol::ServerMessage;
use glyphgate_core::sink::ClientSink;
use glyphgate_core::value::EngineValue;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::dispatcher::{Dispatch, Dispatcher};
use super::engine::EngineLauncher;
use crate::config::SessionConfig;

/// One engine callback in flight to the session task.
#[derive(Debug)]
pub struct EngineCall {
    /// Callback name.
    pub name: String,
    /// Positional arguments.
    pub args: Vec<EngineValue>,
    reply: oneshot::Sender<Dispatch>,
}

/// The engine's way into its session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCall>,
}

impl EngineHandle {
    /// Invokes a callback and waits for its value, including any time spent
    /// suspended on client input.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Disconnected` if the session has ended.
    pub async fn call(
        &self,
        name: impl Into<String>,
        args: Vec<EngineValue>,
    ) -> Result<EngineValue, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineCall {
                name: name.into(),
                args,
                reply,
            })
            .await
            .map_err(|_| SessionError::Disconnected)?;
        let dispatch = rx.await.map_err(|_| SessionError::Disconnected)?;
        Ok(dispatch.value().await)
    }

    /// Blocking form of [`Self::call`] for engines on their own OS thread.
    /// Must not be called from async code.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Disconnected` if the session has ended.
    pub fn blocking_call(
        &self,
        name: impl Into<String>,
        args: Vec<EngineValue>,
    ) -> Result<EngineValue, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .blocking_send(EngineCall {
                name: name.into(),
                args,
                reply,
            })
            .map_err(|_| SessionError::Disconnected)?;
        match rx.blocking_recv().map_err(|_| SessionError::Disconnected)? {
            Dispatch::Ready(value) => Ok(value),
            Dispatch::Suspended(deferred) => Ok(deferred.blocking_wait()),
        }
    }
}

/// Receiving end of the engine channel, consumed by [`Session`].
#[derive(Debug)]
pub struct EngineCalls {
    rx: mpsc::Receiver<EngineCall>,
}

/// Creates a connected engine handle and call receiver.
#[must_use]
pub fn engine_channel(capacity: usize) -> (EngineHandle, EngineCalls) {
    let (tx, rx) = mpsc::channel(capacity);
    (EngineHandle { tx }, EngineCalls { rx })
}

/// [`ClientSink`] that forwards to the connection's writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<ServerMessage>);

impl ChannelSink {
    /// Wraps the sending half of an outbound channel.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self(tx)
    }
}

impl ClientSink for ChannelSink {
    fn send(&self, message: ServerMessage) {
        if self.0.send(message).is_err() {
            debug!("client writer gone; dropping outbound message");
        }
    }
}

/// The transport's side of a session: push frames in, pull events out.
/// Dropping `frames` tells the session the client disconnected.
#[derive(Debug)]
pub struct ClientLink {
    /// Session identifier, for logging.
    pub id: Uuid,
    /// Raw text frames from the client.
    pub frames: mpsc::Sender<String>,
    /// Events for the client.
    pub outbound: mpsc::UnboundedReceiver<ServerMessage>,
}

/// Why a session loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client went away; pending requests were released.
    ClientClosed,
    /// Every engine handle was dropped.
    EngineFinished,
}

/// One client's session: a dispatcher plus the channels feeding it.
pub struct Session {
    id: Uuid,
    dispatcher: Dispatcher,
    calls: EngineCalls,
    frames: mpsc::Receiver<String>,
    tick_interval: Duration,
}

impl Session {
    /// Launches an engine for a new session and wires up its channels.
    ///
    /// # Errors
    ///
    /// Returns whatever the launcher returns if the engine cannot start.
    pub async fn launch(
        config: SessionConfig,
        launcher: &dyn EngineLauncher,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, ClientLink), SessionError> {
        let id = Uuid::new_v4();
        let (handle, calls) = engine_channel(config.channel_capacity);
        let engine = launcher.launch(handle).await?;

        let (out_tx, outbound) = mpsc::unbounded_channel();
        let (frame_tx, frames) = mpsc::channel(config.channel_capacity);
        let tick_interval = config.tick_interval;
        let dispatcher = Dispatcher::new(config, engine, Box::new(ChannelSink::new(out_tx)), clock);

        info!(session_id = %id, "session started");
        Ok((
            Self {
                id,
                dispatcher,
                calls,
                frames,
                tick_interval,
            },
            ClientLink {
                id,
                frames: frame_tx,
                outbound,
            },
        ))
    }

    /// Runs until the client disconnects or the engine finishes.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn run(mut self) -> SessionEnd {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                call = self.calls.rx.recv() => {
                    let Some(call) = call else {
                        break SessionEnd::EngineFinished;
                    };
                    let dispatch = self.dispatcher.dispatch(&call.name, &call.args);
                    if call.reply.send(dispatch).is_err() {
                        debug!(callback = %call.name, "engine stopped waiting for reply");
                    }
                }
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        self.dispatcher.disconnect();
                        break SessionEnd::ClientClosed;
                    };
                    self.dispatcher.handle_frame(&frame);
                }
                _ = tick.tick() => self.dispatcher.expire_stale(),
            }
        };

        info!(?end, "session ended");
        end
    }
}
