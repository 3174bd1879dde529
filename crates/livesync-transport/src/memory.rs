//! A simple in-memory backend and transport for testing.
//!
//! [`MemoryHub`] stores snapshot payloads per query and fans published
//! payloads out to every live subscriber of that query. It also counts
//! fetches and subscriptions so tests can observe channel behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use livesync_core::QuerySpec;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::backend::Backend;
use crate::error::{BackendError, Result, TransportError};
use crate::source::{EventSink, EventSource};
use crate::transport::Transport;

/// Shared state for in-memory snapshots and subscriptions.
pub struct MemoryHub {
    /// Snapshot payload (or failure reason) per query name.
    snapshots: RwLock<HashMap<String, std::result::Result<Value, String>>>,
    /// Live sinks per query name.
    subscribers: RwLock<HashMap<String, Vec<EventSink>>>,
    fetches: AtomicUsize,
    opened: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryHub {
    /// Create a new hub.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a transport connected to this hub.
    pub fn transport(self: &Arc<Self>, name: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            name: name.into(),
            hub: Arc::clone(self),
            mode: Mode::Available,
        }
    }

    /// Serve `payload` for fetches of `query`.
    pub async fn set_snapshot(&self, query: &str, payload: Value) {
        self.snapshots
            .write()
            .await
            .insert(query.to_string(), Ok(payload));
    }

    /// Fail fetches of `query`.
    pub async fn fail_snapshot(&self, query: &str, reason: impl Into<String>) {
        self.snapshots
            .write()
            .await
            .insert(query.to_string(), Err(reason.into()));
    }

    /// Make every fetch fail as if the backend were offline.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Push a payload to every live subscriber of `query`.
    ///
    /// Returns the number of subscribers it reached.
    pub async fn publish(&self, query: &str, payload: Value) -> usize {
        let mut subscribers = self.subscribers.write().await;
        let Some(sinks) = subscribers.get_mut(query) else {
            return 0;
        };
        sinks.retain(|sink| sink.push(payload.clone()).is_ok());
        sinks.len()
    }

    /// Raise a stream error on every live subscriber of `query`.
    pub async fn fail_stream(&self, query: &str, reason: &str) {
        if let Some(sinks) = self.subscribers.write().await.remove(query) {
            for sink in sinks {
                // Subscribers that already left don't need the error.
                let _ = sink.fail(reason);
            }
        }
    }

    /// End every live subscription of `query` without an error.
    pub async fn end_stream(&self, query: &str) {
        self.subscribers.write().await.remove(query);
    }

    /// Subscriptions to `query` that have not been cancelled.
    pub async fn active_subscribers(&self, query: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(query)
            .map_or(0, |sinks| sinks.iter().filter(|s| !s.is_cancelled()).count())
    }

    /// Total fetches served or failed.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Total subscriptions opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            fetches: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Backend for MemoryHub {
    async fn fetch(&self, query: &QuerySpec) -> std::result::Result<Value, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable("memory hub is offline".into()));
        }
        match self.snapshots.read().await.get(&query.name) {
            Some(Ok(payload)) => Ok(payload.clone()),
            Some(Err(reason)) => Err(BackendError::Query {
                query: query.name.clone(),
                reason: reason.clone(),
            }),
            None => Err(BackendError::Query {
                query: query.name.clone(),
                reason: "no snapshot".into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Available,
    Unavailable,
    FailOnOpen,
}

/// In-memory transport implementation.
pub struct MemoryTransport {
    name: String,
    hub: Arc<MemoryHub>,
    mode: Mode,
}

impl MemoryTransport {
    /// Report the transport as absent during negotiation.
    pub fn unavailable(mut self) -> Self {
        self.mode = Mode::Unavailable;
        self
    }

    /// Raise on every subscribe.
    pub fn failing(mut self) -> Self {
        self.mode = Mode::FailOnOpen;
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.mode != Mode::Unavailable
    }

    async fn subscribe(&self, query: &QuerySpec) -> Result<EventSource> {
        match self.mode {
            Mode::Available => {}
            Mode::Unavailable => {
                return Err(TransportError::Unavailable {
                    query: query.name.clone(),
                    reason: format!("{} is not available", self.name),
                })
            }
            Mode::FailOnOpen => {
                return Err(TransportError::OpenFailed {
                    transport: self.name.clone(),
                    reason: "connection refused".into(),
                })
            }
        }

        let (sink, source) = EventSource::channel();
        self.hub
            .subscribers
            .write()
            .await
            .entry(query.name.clone())
            .or_default()
            .push(sink);
        self.hub.opened.fetch_add(1, Ordering::SeqCst);
        Ok(source)
    }
}
