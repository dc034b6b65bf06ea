//! Pending-request registry: the suspension points the engine waits on.
//!
//! Each engine callback that needs client input either gets an answer from
//! a fresh buffered input right away or registers a resolver and hands the
//! engine a [`Deferred`]. At most one resolver exists per [`RequestKind`].

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, TimeDelta, Utc};
use glyphgate_core::error::SessionError;
use glyphgate_core::value::{EngineValue, RequestKind};
use tokio::sync::oneshot;
use tracing::debug;

use super::keys;

/// How raw client input is turned into the value the engine expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single key code.
    Key,
    /// A typed line of text.
    Line,
    /// A menu selection; computed by the dispatcher, never from raw input.
    Selection,
}

impl ResponseShape {
    /// Decodes raw client input for this shape.
    #[must_use]
    pub fn decode(self, raw: &str) -> EngineValue {
        match self {
            Self::Key => EngineValue::Int(keys::decode_key(raw)),
            Self::Line if keys::is_cancel(raw) => self.fallback(),
            Self::Line => EngineValue::Str(raw.to_owned()),
            Self::Selection => EngineValue::Array(Vec::new()),
        }
    }

    /// The safe default used on timeout and disconnect.
    #[must_use]
    pub fn fallback(self) -> EngineValue {
        match self {
            Self::Key => EngineValue::Int(keys::ESCAPE),
            Self::Line => EngineValue::Str("\u{1b}".to_owned()),
            Self::Selection => EngineValue::Array(Vec::new()),
        }
    }
}

/// A value the engine must wait for.
///
/// Resolves to the shape's fallback if the registry is dropped without
/// answering, so an awaiting engine can never hang on a dead session.
#[derive(Debug)]
pub struct Deferred {
    fallback: EngineValue,
    rx: oneshot::Receiver<EngineValue>,
}

impl Deferred {
    /// Blocks the current thread until resolved. For engines running on
    /// their own OS thread; must not be called from async code.
    #[must_use]
    pub fn blocking_wait(self) -> EngineValue {
        self.rx.blocking_recv().unwrap_or(self.fallback)
    }
}

impl Future for Deferred {
    type Output = EngineValue;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(_)) => Poll::Ready(self.fallback.clone()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Outcome of asking the registry for input.
#[derive(Debug)]
pub enum Awaited {
    /// Buffered input answered the request immediately.
    Ready(EngineValue),
    /// The engine must wait.
    Suspended(Deferred),
}

/// Client input that arrived with nothing waiting for it, or that was
/// carried over from an answered request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedInput {
    /// Input as received.
    pub raw: String,
    /// Arrival time.
    pub received_at: DateTime<Utc>,
    /// The only kind this input may still answer; `None` means any kind.
    pub reserved_for: Option<RequestKind>,
}

#[derive(Debug)]
struct PendingRequest {
    shape: ResponseShape,
    reply: oneshot::Sender<EngineValue>,
    created_at: DateTime<Utc>,
}

/// Outstanding requests (one per kind) plus the latest client input.
#[derive(Debug)]
pub struct PendingRequestRegistry {
    pending: HashMap<RequestKind, PendingRequest>,
    latest: Option<BufferedInput>,
    cooldown: TimeDelta,
}

impl PendingRequestRegistry {
    /// Creates a registry whose buffered input stays usable for `cooldown`.
    #[must_use]
    pub fn new(cooldown: TimeDelta) -> Self {
        Self {
            pending: HashMap::new(),
            latest: None,
            cooldown,
        }
    }

    /// Returns `true` if a request of `kind` is outstanding.
    #[must_use]
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// The buffered client input, if any is still unconsumed.
    #[cfg(test)]
    #[must_use]
    pub fn latest_input(&self) -> Option<&BufferedInput> {
        self.latest.as_ref()
    }

    /// Answers a request from fresh buffered input, or registers a resolver
    /// and returns a suspension handle.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyPending` if a request of `kind` is
    /// already outstanding. Callers check [`Self::is_pending`] first; this
    /// is an invariant violation, not a recoverable condition.
    pub fn await_input(
        &mut self,
        kind: RequestKind,
        shape: ResponseShape,
        now: DateTime<Utc>,
    ) -> Result<Awaited, SessionError> {
        if self.is_pending(kind) {
            return Err(SessionError::AlreadyPending(kind));
        }
        if shape != ResponseShape::Selection {
            if let Some(raw) = self.take_fresh(kind, now) {
                debug!(%kind, input = %raw, "answered from buffered input");
                return Ok(Awaited::Ready(shape.decode(&raw)));
            }
        }

        let (reply, rx) = oneshot::channel();
        self.pending.insert(
            kind,
            PendingRequest {
                shape,
                reply,
                created_at: now,
            },
        );
        Ok(Awaited::Suspended(Deferred {
            fallback: shape.fallback(),
            rx,
        }))
    }

    /// Delivers raw client input to the outstanding request of `kind`.
    ///
    /// With no such request the input is buffered for the next request of
    /// any kind and nothing is resolved. Input that resolves a request is
    /// spent. Returns `true` if a request was resolved.
    pub fn resolve(&mut self, kind: RequestKind, raw: &str, now: DateTime<Utc>) -> bool {
        let Some(request) = self.pending.remove(&kind) else {
            self.buffer(raw, now, None);
            return false;
        };
        self.latest = None;
        let value = request.shape.decode(raw);
        if request.reply.send(value).is_err() {
            debug!(%kind, "engine dropped its handle before resolution");
        }
        true
    }

    /// Keeps already-spent input around for one follow-up request of
    /// `kind` within the cooldown. Used when a direction answer is read a
    /// second time by the engine's position query in the same turn.
    pub fn carry_over(&mut self, raw: &str, now: DateTime<Utc>, kind: RequestKind) {
        self.buffer(raw, now, Some(kind));
    }

    fn buffer(&mut self, raw: &str, now: DateTime<Utc>, reserved_for: Option<RequestKind>) {
        self.latest = Some(BufferedInput {
            raw: raw.to_owned(),
            received_at: now,
            reserved_for,
        });
    }

    /// Resolves the outstanding request of `kind` with a computed value.
    /// Returns `false` if nothing was pending.
    pub fn resolve_value(&mut self, kind: RequestKind, value: EngineValue) -> bool {
        let Some(request) = self.pending.remove(&kind) else {
            return false;
        };
        if request.reply.send(value).is_err() {
            debug!(%kind, "engine dropped its handle before resolution");
        }
        true
    }

    /// Resolves every request older than `timeout` with its fallback and
    /// returns the kinds that expired.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: TimeDelta) -> Vec<RequestKind> {
        let expired: Vec<RequestKind> = RequestKind::ALL
            .into_iter()
            .filter(|kind| {
                self.pending
                    .get(kind)
                    .is_some_and(|p| now - p.created_at >= timeout)
            })
            .collect();
        for kind in &expired {
            self.release(*kind);
        }
        expired
    }

    /// Resolves every outstanding request with its fallback. Returns how
    /// many were released.
    pub fn release_all(&mut self) -> usize {
        let kinds: Vec<RequestKind> = self.pending.keys().copied().collect();
        for kind in &kinds {
            self.release(*kind);
        }
        self.latest = None;
        kinds.len()
    }

    fn release(&mut self, kind: RequestKind) {
        if let Some(request) = self.pending.remove(&kind) {
            let _ = request.reply.send(request.shape.fallback());
        }
    }

    /// Takes the buffered input if it is fresh and may serve `kind`.
    /// Buffered input answers at most one request.
    fn take_fresh(&mut self, kind: RequestKind, now: DateTime<Utc>) -> Option<String> {
        let input = self.latest.as_ref()?;
        if now - input.received_at > self.cooldown {
            self.latest = None;
            return None;
        }
        if input.reserved_for.is_some_and(|reserved| reserved != kind) {
            return None;
        }
        self.latest.take().map(|input| input.raw)
    }
}
