//! Live event sources.
//!
//! A transport hands out an [`EventSource`] per subscription and keeps the
//! matching [`EventSink`] to push payloads into. Pushing never blocks the
//! producer. Cancellation is shared through a [`SourceHandle`], so the
//! subscriber can cancel while another task owns the source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::error::{Result, TransportError};

/// One item delivered by a live source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// A push payload, in any envelope shape.
    Payload(Value),
    /// The source raised. Terminal: nothing follows it.
    Error(TransportError),
}

struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation handle shared by a source and its sink.
#[derive(Clone)]
pub struct SourceHandle {
    state: Arc<CancelState>,
}

impl SourceHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel the source.
    ///
    /// Idempotent. Returns `true` only for the call that actually cancelled.
    pub fn cancel(&self) -> bool {
        let first = !self.state.cancelled.swap(true, Ordering::SeqCst);
        if first {
            self.state.notify.notify_waiters();
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the source is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Producer side of a live subscription.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SourceEvent>,
    handle: SourceHandle,
}

impl EventSink {
    /// Push a payload. Fails once the subscriber is gone or cancelled.
    pub fn push(&self, payload: Value) -> Result<()> {
        self.send(SourceEvent::Payload(payload))
    }

    /// Report a terminal stream error as [`TransportError::Stream`].
    pub fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.send(SourceEvent::Error(TransportError::Stream(reason.into())))
    }

    fn send(&self, event: SourceEvent) -> Result<()> {
        if self.handle.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        self.tx.send(event).map_err(|_| TransportError::Cancelled)
    }

    /// Whether the subscriber has cancelled or dropped the source.
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled() || self.tx.is_closed()
    }

    /// Resolve once the subscriber cancels.
    pub async fn cancelled(&self) {
        self.handle.cancelled().await
    }
}

/// Consumer side of a live subscription.
///
/// Dropping the source cancels it.
pub struct EventSource {
    rx: mpsc::UnboundedReceiver<SourceEvent>,
    handle: SourceHandle,
    ended: bool,
}

impl EventSource {
    /// Create a connected sink/source pair.
    pub fn channel() -> (EventSink, EventSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SourceHandle::new();
        let sink = EventSink {
            tx,
            handle: handle.clone(),
        };
        let source = EventSource {
            rx,
            handle,
            ended: false,
        };
        (sink, source)
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the source is cancelled, once every sink is
    /// gone, or after an error event has been returned.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        if self.ended || self.handle.is_cancelled() {
            return None;
        }

        let event = tokio::select! {
            biased;
            _ = self.handle.cancelled() => None,
            event = self.rx.recv() => event,
        };

        match event {
            Some(SourceEvent::Error(error)) => {
                self.ended = true;
                Some(SourceEvent::Error(error))
            }
            Some(event) => Some(event),
            None => {
                self.ended = true;
                None
            }
        }
    }

    /// Cancel the source. Safe to call repeatedly or after it has ended.
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// A cancellation handle that outlives moves of the source.
    pub fn handle(&self) -> SourceHandle {
        self.handle.clone()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("cancelled", &self.is_cancelled())
            .field("ended", &self.ended)
            .finish()
    }
}
