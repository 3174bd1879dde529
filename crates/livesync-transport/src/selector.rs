//! Transport selection.
//!
//! Capabilities are negotiated once, when the selector is built. Opening a
//! subscription then tries the primary transport and falls back to the
//! secondary one if the primary is absent or raises while opening.

use std::fmt;
use std::sync::Arc;

use livesync_core::QuerySpec;

use crate::error::{Result, TransportError};
use crate::source::EventSource;
use crate::transport::Transport;

/// Which transport served a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Primary,
    Secondary,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Primary => f.write_str("primary"),
            TransportKind::Secondary => f.write_str("secondary"),
        }
    }
}

/// Result of capability negotiation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub primary: bool,
    pub secondary: bool,
}

impl Capabilities {
    /// Whether any live transport may be opened.
    pub fn any(&self) -> bool {
        self.primary || self.secondary
    }
}

/// A successfully opened live subscription.
#[derive(Debug)]
pub struct Selected {
    pub kind: TransportKind,
    pub transport: String,
    pub source: EventSource,
}

/// Picks a live transport for each subscription.
#[derive(Clone, Default)]
pub struct TransportSelector {
    primary: Option<Arc<dyn Transport>>,
    secondary: Option<Arc<dyn Transport>>,
    capabilities: Capabilities,
}

impl TransportSelector {
    /// Negotiate capabilities for a primary and an optional secondary
    /// transport.
    pub fn negotiate(
        primary: Option<Arc<dyn Transport>>,
        secondary: Option<Arc<dyn Transport>>,
    ) -> Self {
        let capabilities = Capabilities {
            primary: primary.as_ref().is_some_and(|t| t.is_available()),
            secondary: secondary.as_ref().is_some_and(|t| t.is_available()),
        };

        tracing::debug!(
            primary = capabilities.primary,
            secondary = capabilities.secondary,
            "negotiated live transports"
        );

        Self {
            primary,
            secondary,
            capabilities,
        }
    }

    /// A selector with no live transports (fetch-once mode).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Open a live subscription, primary first.
    pub async fn open(&self, query: &QuerySpec) -> Result<Selected> {
        let candidates = [
            (TransportKind::Primary, self.capabilities.primary, &self.primary),
            (TransportKind::Secondary, self.capabilities.secondary, &self.secondary),
        ];

        let mut failures = Vec::new();

        for (kind, available, transport) in candidates {
            let Some(transport) = transport.as_ref().filter(|_| available) else {
                continue;
            };

            match transport.subscribe(query).await {
                Ok(source) => {
                    tracing::info!(
                        query = %query,
                        transport = transport.name(),
                        %kind,
                        "live transport opened"
                    );
                    return Ok(Selected {
                        kind,
                        transport: transport.name().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        query = %query,
                        transport = transport.name(),
                        %kind,
                        "live transport failed to open: {}",
                        e
                    );
                    failures.push(e.to_string());
                }
            }
        }

        let reason = if failures.is_empty() {
            "no transport available".to_string()
        } else {
            failures.join("; ")
        };

        Err(TransportError::Unavailable {
            query: query.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSelector")
            .field("primary", &self.primary.as_ref().map(|t| t.name().to_string()))
            .field("secondary", &self.secondary.as_ref().map(|t| t.name().to_string()))
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
