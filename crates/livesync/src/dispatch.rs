//! Consumer fan-out.
//!
//! Consumers run synchronously, in registration order, on the channel's
//! task. A consumer that fails or panics is logged and skipped; the rest
//! still see the same update.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use livesync_core::Record;

/// Immutable view of a channel's cache.
pub type Records = Arc<[Record]>;

/// Receives the full reconciled cache after every reconciliation.
pub trait Consumer: Send {
    fn on_update(&mut self, records: &Records) -> anyhow::Result<()>;
}

impl<F> Consumer for F
where
    F: FnMut(&Records) -> anyhow::Result<()> + Send,
{
    fn on_update(&mut self, records: &Records) -> anyhow::Result<()> {
        self(records)
    }
}

/// Handle for removing a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    pub panicked: usize,
}

/// Ordered consumer list owned by a channel task.
#[derive(Default)]
pub(crate) struct Dispatcher {
    consumers: Vec<(ConsumerId, Box<dyn Consumer>)>,
}

impl Dispatcher {
    pub(crate) fn add(&mut self, id: ConsumerId, consumer: Box<dyn Consumer>) {
        self.consumers.push((id, consumer));
    }

    pub(crate) fn remove(&mut self, id: ConsumerId) -> bool {
        let before = self.consumers.len();
        self.consumers.retain(|(existing, _)| *existing != id);
        self.consumers.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.consumers.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Deliver `records` to every consumer in registration order.
    pub(crate) fn dispatch(&mut self, query: &str, records: &Records) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (id, consumer) in self.consumers.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| consumer.on_update(records))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(query, consumer = %id, "consumer failed: {:#}", e);
                }
                Err(payload) => {
                    report.panicked += 1;
                    tracing::error!(
                        query,
                        consumer = %id,
                        "consumer panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
