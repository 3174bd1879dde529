//! Tracing layer that keeps every emitted event for log assertions.
//!
//! Installation is scoped to the current thread, so use it from a
//! current-thread runtime (the `#[tokio::test]` default). Channel tasks
//! spawned there run on the same thread and are captured too.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::Registry;

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub target: String,
    pub message: String,
    /// Every other field, formatted with `Debug` (or `Display` when
    /// recorded with `%`).
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of field `name`, if recorded.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Shared store of captured events. Clones share the store.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every event on this thread until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        tracing::subscriber::set_default(Registry::default().with(self.clone()))
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().clone()
    }

    /// Events at `level` whose message contains `needle`.
    pub fn count(&self, level: Level, needle: &str) -> usize {
        self.lock()
            .iter()
            .filter(|event| event.level == level && event.message.contains(needle))
            .count()
    }

    /// Events whose message contains `needle`, any level.
    pub fn matching(&self, needle: &str) -> Vec<CapturedEvent> {
        self.lock()
            .iter()
            .filter(|event| event.message.contains(needle))
            .cloned()
            .collect()
    }

    /// Warnings whose message contains `needle`.
    pub fn warnings(&self, needle: &str) -> usize {
        self.count(Level::WARN, needle)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CapturedEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{value:?}");
        match field.name() {
            "message" => self.message = value,
            name => self.fields.push((name.to_string(), value)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            name => self.fields.push((name.to_string(), value.to_string())),
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.lock().push(CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captures_formatted_message() {
        let capture = LogCapture::new();
        {
            let _guard = capture.install();
            tracing::warn!(query = "jobs", "transport down: {}", "reset");
            tracing::debug!("quiet");
        }
        tracing::warn!("after the guard");

        assert_eq!(capture.warnings("transport down: reset"), 1);
        assert_eq!(capture.count(Level::DEBUG, "quiet"), 1);
        assert_eq!(capture.warnings("after the guard"), 0);
        assert_eq!(capture.events().len(), 2);

        let warning = &capture.matching("transport down")[0];
        assert_eq!(warning.field("query"), Some("jobs"));
        assert_eq!(warning.field("missing"), None);
    }
}
