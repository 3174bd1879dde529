//! Channel: one live-synchronized record list.
//!
//! Each channel runs as a single-writer task. Every operation (open,
//! close, consumer registration, live events) is a message on one queue,
//! so reconciliations happen strictly in arrival order and the cache is
//! only ever touched by that task.
//!
//! ```text
//! Channel handle ──┐
//!                  ├─> command queue ──> ChannelTask (cache, consumers)
//! forwarder task ──┘         ▲
//!       ▲                    │ fetch / select transport
//!   EventSource <────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use livesync_core::{classify_text_aware, reconcile, EntityConfig, Envelope, Normalized, QuerySpec};
use livesync_transport::{
    Backend, EventSource, SourceEvent, SourceHandle, TransportError, TransportKind,
    TransportSelector,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::dispatch::{Consumer, ConsumerId, Dispatcher, Records};
use crate::error::{LiveSyncError, Result};

/// Configuration for a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Query used for both the snapshot fetch and the live subscription.
    pub query: QuerySpec,
    /// Identity, shape, and merge settings of the entity.
    pub entity: EntityConfig,
}

impl ChannelConfig {
    pub fn new(query: QuerySpec, entity: EntityConfig) -> Self {
        Self { query, entity }
    }

    /// Derive the query name from the entity's subscription field, falling
    /// back to the entity name.
    pub fn for_entity(entity: EntityConfig) -> Self {
        let name = entity
            .subscription_field
            .clone()
            .unwrap_or_else(|| entity.entity.clone());
        Self {
            query: QuerySpec::new(name),
            entity,
        }
    }
}

/// Summary of a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenReport {
    /// Records in the cache after the snapshot.
    pub records: usize,
    /// Transport serving live updates, `None` in fetch-once mode.
    pub transport: Option<TransportKind>,
}

enum Command {
    Open {
        reply: oneshot::Sender<Result<OpenReport>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    AddConsumer {
        id: ConsumerId,
        consumer: Box<dyn Consumer>,
    },
    RemoveConsumer {
        id: ConsumerId,
        reply: oneshot::Sender<bool>,
    },
    Records {
        reply: oneshot::Sender<Records>,
    },
    Event {
        session: u64,
        payload: Value,
    },
    SourceFailed {
        session: u64,
        error: TransportError,
    },
    SourceEnded {
        session: u64,
    },
    Shutdown,
}

/// Handle to a live-synchronized record list.
///
/// Must be created inside a Tokio runtime. Dropping the handle stops the
/// channel's task and cancels its live source.
pub struct Channel {
    query: QuerySpec,
    tx: mpsc::UnboundedSender<Command>,
    next_consumer: AtomicU64,
}

impl Channel {
    /// Create a channel. Nothing is fetched until [`Channel::open`].
    pub fn new(
        config: ChannelConfig,
        backend: Arc<dyn Backend>,
        selector: TransportSelector,
    ) -> Result<Self> {
        config.entity.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let query = config.query.clone();
        let task = ChannelTask {
            config,
            backend,
            selector,
            tx: tx.clone(),
            cache: Records::from(Vec::new()),
            dispatcher: Dispatcher::default(),
            session: None,
            next_session: 1,
            warned_unavailable: false,
        };
        tokio::spawn(task.run(rx));

        Ok(Self {
            query,
            tx,
            next_consumer: AtomicU64::new(1),
        })
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Fetch the snapshot, deliver it, and start live updates.
    ///
    /// Re-opening first cancels the current live source, so at most one is
    /// active at any time. Unlike [`Channel::close`], a re-open keeps every
    /// registered consumer, so they receive the fresh snapshot.
    pub async fn open(&self) -> Result<OpenReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Open { reply })?;
        rx.await.map_err(|_| LiveSyncError::ChannelClosed)?
    }

    /// Cancel the live source and drop every consumer.
    ///
    /// The cache is kept, so [`Channel::records`] keeps returning the last
    /// reconciled list until the next successful open.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Close { reply })?;
        rx.await.map_err(|_| LiveSyncError::ChannelClosed)
    }

    /// Register a consumer for every subsequent reconciliation.
    pub fn on_update<C>(&self, consumer: C) -> Result<ConsumerId>
    where
        C: Consumer + 'static,
    {
        let id = ConsumerId(self.next_consumer.fetch_add(1, Ordering::Relaxed));
        self.send(Command::AddConsumer {
            id,
            consumer: Box::new(consumer),
        })?;
        Ok(id)
    }

    /// Unregister one consumer. Returns `false` if it was not registered.
    pub async fn remove_consumer(&self, id: ConsumerId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RemoveConsumer { id, reply })?;
        rx.await.map_err(|_| LiveSyncError::ChannelClosed)
    }

    /// The current cache.
    pub async fn records(&self) -> Result<Records> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Records { reply })?;
        rx.await.map_err(|_| LiveSyncError::ChannelClosed)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .map_err(|_| LiveSyncError::ChannelClosed)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        // The task may already be gone.
        let _ = self.tx.send(Command::Shutdown);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel").field("query", &self.query).finish()
    }
}

/// A live subscription started by one open.
struct Session {
    id: u64,
    /// `None` in fetch-once mode or after the source ended.
    source: Option<SourceHandle>,
}

/// The single writer owning a channel's cache and consumers.
struct ChannelTask {
    config: ChannelConfig,
    backend: Arc<dyn Backend>,
    selector: TransportSelector,
    tx: mpsc::UnboundedSender<Command>,
    cache: Records,
    dispatcher: Dispatcher,
    session: Option<Session>,
    next_session: u64,
    warned_unavailable: bool,
}

impl ChannelTask {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Open { reply } => {
                    let result = self.open().await;
                    let _ = reply.send(result);
                }
                Command::Close { reply } => {
                    self.close();
                    let _ = reply.send(());
                }
                Command::AddConsumer { id, consumer } => {
                    self.dispatcher.add(id, consumer);
                }
                Command::RemoveConsumer { id, reply } => {
                    let _ = reply.send(self.dispatcher.remove(id));
                }
                Command::Records { reply } => {
                    let _ = reply.send(Arc::clone(&self.cache));
                }
                Command::Event { session, payload } => {
                    self.handle_event(session, &payload);
                }
                Command::SourceFailed { session, error } => {
                    self.handle_source_failed(session, &error);
                }
                Command::SourceEnded { session } => {
                    self.handle_source_ended(session);
                }
                Command::Shutdown => break,
            }
        }

        self.end_session();
        tracing::debug!(query = %self.config.query, "channel task stopped");
    }

    async fn open(&mut self) -> Result<OpenReport> {
        self.end_session();

        let query = &self.config.query;
        let payload = match self.backend.fetch(query).await {
            Ok(payload) => payload,
            Err(source) => {
                tracing::warn!(query = %query, "snapshot fetch failed: {}", source);
                return Err(LiveSyncError::SnapshotFetchFailed {
                    query: query.name.clone(),
                    source,
                });
            }
        };

        let input = self.normalize(&payload);
        let reconciled = reconcile(&[], input, &self.config.entity);
        self.cache = Records::from(reconciled.cache);
        tracing::debug!(
            query = %self.config.query,
            records = self.cache.len(),
            consumers = self.dispatcher.len(),
            "snapshot reconciled"
        );
        self.dispatcher.dispatch(&self.config.query.name, &self.cache);

        let id = self.next_session;
        self.next_session += 1;

        let opened = self.selector.open(&self.config.query).await;
        let (source, transport) = match opened {
            Ok(selected) => {
                let handle = selected.source.handle();
                tokio::spawn(forward(id, selected.source, self.tx.clone()));
                (Some(handle), Some(selected.kind))
            }
            Err(e) => {
                if !self.warned_unavailable {
                    self.warned_unavailable = true;
                    tracing::warn!(
                        query = %self.config.query,
                        "live updates unavailable, serving fetch-once data: {}",
                        e
                    );
                }
                (None, None)
            }
        };

        self.session = Some(Session { id, source });

        Ok(OpenReport {
            records: self.cache.len(),
            transport,
        })
    }

    fn close(&mut self) {
        self.end_session();
        self.dispatcher.clear();
        tracing::debug!(query = %self.config.query, "channel closed");
    }

    /// Cancel the live source, if any. Events from it are dropped from now on.
    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(source) = session.source {
                source.cancel();
            }
        }
    }

    fn normalize(&self, payload: &Value) -> Normalized {
        let envelope = classify_text_aware(payload, &self.config.entity);
        match &envelope {
            Envelope::Unknown => {
                tracing::debug!(query = %self.config.query, "payload not recognized, ignoring");
            }
            Envelope::List { location, records } => {
                tracing::trace!(
                    query = %self.config.query,
                    envelope = envelope.label(),
                    %location,
                    records = records.len(),
                    "payload classified"
                );
            }
            _ => {
                tracing::trace!(
                    query = %self.config.query,
                    envelope = envelope.label(),
                    "payload classified"
                );
            }
        }
        Normalized::from(envelope)
    }

    fn is_current(&self, session: u64) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    fn handle_event(&mut self, session: u64, payload: &Value) {
        let input = self.normalize(payload);

        if !self.is_current(session) {
            tracing::debug!(query = %self.config.query, session, "dropping event from closed session");
            return;
        }
        if input.is_empty() {
            return;
        }

        let reconciled = reconcile(&self.cache, input, &self.config.entity);
        tracing::debug!(
            query = %self.config.query,
            session,
            applied = ?reconciled.applied,
            "live event reconciled"
        );
        if !reconciled.applied.changed() {
            return;
        }

        self.cache = Records::from(reconciled.cache);
        self.dispatcher.dispatch(&self.config.query.name, &self.cache);
    }

    fn handle_source_failed(&mut self, session: u64, error: &TransportError) {
        if !self.is_current(session) {
            return;
        }
        tracing::warn!(
            query = %self.config.query,
            session,
            "live transport error, serving last good data: {}",
            error
        );
        if let Some(current) = self.session.as_mut() {
            current.source = None;
        }
    }

    fn handle_source_ended(&mut self, session: u64) {
        if !self.is_current(session) {
            return;
        }
        tracing::debug!(query = %self.config.query, session, "live source ended");
        if let Some(current) = self.session.as_mut() {
            current.source = None;
        }
    }
}

/// Pump one source into the channel's queue, tagged with its session.
async fn forward(session: u64, mut source: EventSource, tx: mpsc::UnboundedSender<Command>) {
    while let Some(event) = source.next().await {
        let command = match event {
            SourceEvent::Payload(payload) => Command::Event { session, payload },
            SourceEvent::Error(error) => Command::SourceFailed { session, error },
        };
        if tx.send(command).is_err() {
            return;
        }
    }
    let _ = tx.send(Command::SourceEnded { session });
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_core::Record;
    use livesync_testkit::LogCapture;
    use livesync_transport::MemoryHub;
    use serde_json::json;
    use tracing::Level;

    fn config() -> ChannelConfig {
        ChannelConfig::for_entity(EntityConfig::activities())
    }

    #[test]
    fn test_for_entity_uses_subscription_field() {
        assert_eq!(config().query.name, "subscribeToCalcActivities");
        let bare = ChannelConfig::for_entity(EntityConfig::new("Widget"));
        assert_eq!(bare.query.name, "Widget");
    }

    #[tokio::test]
    async fn test_event_from_closed_session_is_dropped() {
        let hub = MemoryHub::new();
        let query = config().query.name;
        hub.set_snapshot(&query, json!({ "records": [{ "id": "1", "task": "A" }] }))
            .await;

        let selector = TransportSelector::negotiate(Some(Arc::new(hub.transport("ws"))), None);
        let channel = Channel::new(config(), hub.clone(), selector).unwrap();
        channel.open().await.unwrap();
        channel.close().await.unwrap();

        // An event that was already queued when the session closed.
        channel
            .send(Command::Event {
                session: 1,
                payload: json!({ "records": [{ "id": "2", "task": "B" }] }),
            })
            .unwrap();

        let records = channel.records().await.unwrap();
        assert_eq!(
            records.to_vec(),
            vec![Record::from_value(json!({ "id": "1", "task": "A" })).unwrap()]
        );
    }

    #[tokio::test]
    async fn test_classification_is_logged() {
        let capture = LogCapture::new();
        let _guard = capture.install();

        let hub = MemoryHub::new();
        let query = config().query.name;
        hub.set_snapshot(
            &query,
            json!({ "payload": { "records": [{ "id": "1", "task": "A" }] } }),
        )
        .await;
        let channel = Channel::new(config(), hub, TransportSelector::none()).unwrap();
        channel.open().await.unwrap();

        let classified = capture.matching("payload classified");
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].level, Level::TRACE);
        assert_eq!(classified[0].field("envelope"), Some("list"));
        assert_eq!(classified[0].field("location"), Some("payload.records"));
        assert_eq!(classified[0].field("records"), Some("1"));
    }

    #[tokio::test]
    async fn test_operations_fail_after_shutdown() {
        let hub = MemoryHub::new();
        let channel = Channel::new(config(), hub, TransportSelector::none()).unwrap();
        channel.send(Command::Shutdown).unwrap();

        // Wait for the task to exit.
        while !channel.tx.is_closed() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(
            channel.records().await,
            Err(LiveSyncError::ChannelClosed)
        ));
    }
}
