//! Shared registry of channels.
//!
//! A [`SyncContext`] owns the backend and transport negotiation for an
//! application and hands out one [`Channel`] per query name, created on
//! first use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livesync_transport::{Backend, TransportSelector};

use crate::channel::{Channel, ChannelConfig};
use crate::error::Result;

pub struct SyncContext {
    backend: Arc<dyn Backend>,
    selector: TransportSelector,
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

impl SyncContext {
    pub fn new(backend: Arc<dyn Backend>, selector: TransportSelector) -> Self {
        Self {
            backend,
            selector,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Get the channel for `config.query`, creating it if needed.
    ///
    /// An existing channel keeps the configuration it was created with.
    pub fn channel(&self, config: ChannelConfig) -> Result<Arc<Channel>> {
        let mut channels = self.lock();
        if let Some(channel) = channels.get(&config.query.name) {
            return Ok(Arc::clone(channel));
        }

        let name = config.query.name.clone();
        let channel = Arc::new(Channel::new(
            config,
            Arc::clone(&self.backend),
            self.selector.clone(),
        )?);
        tracing::debug!(query = %name, "channel created");
        channels.insert(name, Arc::clone(&channel));
        Ok(channel)
    }

    pub fn get(&self, query: &str) -> Option<Arc<Channel>> {
        self.lock().get(query).cloned()
    }

    /// Forget a channel. It shuts down once the last handle is dropped.
    pub fn remove(&self, query: &str) -> Option<Arc<Channel>> {
        self.lock().remove(query)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Close every registered channel. Channels stay registered.
    pub async fn close_all(&self) {
        let channels: Vec<_> = self.lock().values().cloned().collect();
        for channel in channels {
            if let Err(e) = channel.close().await {
                tracing::warn!(query = %channel.query(), "close failed: {}", e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<Channel>>> {
        // The map holds no invariant a panicking holder could break.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("selector", &self.selector)
            .field("channels", &self.len())
            .finish()
    }
}
