//! Consumer that records every delivered cache.

use std::sync::Arc;
use std::time::Duration;

use livesync_core::{Identity, IdentityKeys, Record};
use tokio::sync::mpsc;

/// How long [`Recorder::next`] waits for a delivery.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Receiving side of a recording consumer.
pub struct Recorder {
    rx: mpsc::UnboundedReceiver<Arc<[Record]>>,
}

/// Create a consumer closure and the recorder observing it.
pub fn recorder() -> (
    impl FnMut(&Arc<[Record]>) -> anyhow::Result<()> + Send + 'static,
    Recorder,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let consumer = move |records: &Arc<[Record]>| -> anyhow::Result<()> {
        tx.send(Arc::clone(records))
            .map_err(|_| anyhow::anyhow!("recorder dropped"))
    };
    (consumer, Recorder { rx })
}

impl Recorder {
    /// Next delivery. Panics after [`DELIVERY_TIMEOUT`].
    pub async fn next(&mut self) -> Arc<[Record]> {
        match tokio::time::timeout(DELIVERY_TIMEOUT, self.rx.recv()).await {
            Ok(Some(records)) => records,
            Ok(None) => panic!("consumer was dropped"),
            Err(_) => panic!("no delivery within {DELIVERY_TIMEOUT:?}"),
        }
    }

    /// A delivery that has already arrived, if any.
    pub fn try_next(&mut self) -> Option<Arc<[Record]>> {
        self.rx.try_recv().ok()
    }

    /// True once the consumer has been dropped and every delivery read.
    pub async fn is_finished(&mut self) -> bool {
        matches!(
            tokio::time::timeout(DELIVERY_TIMEOUT, self.rx.recv()).await,
            Ok(None)
        )
    }
}

/// Identities of `records` in order, using the default identity keys.
pub fn ids(records: &[Record]) -> Vec<String> {
    let keys = IdentityKeys::default();
    records
        .iter()
        .filter_map(|record| record.identity(&keys))
        .map(|identity: Identity| identity.to_string())
        .collect()
}
