//! Event system infrastructure for the upload console.
//!
//! This crate provides the event system that decouples the console components
//! (integration cards, the upload zone, the uploads table) from the query cache
//! that keeps their lists fresh.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing every successful (or settled) mutation
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (domain, service), avoiding
//! circular dependencies. Integration kinds are carried as their wire names.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A type alias for backend record ids.
pub type Id = Uuid;

/// Events emitted by console components once a backend mutation has settled.
///
/// Every variant invalidates at least one cached list; see [`DomainEvent::touches_integrations`]
/// and [`DomainEvent::touches_uploads`].
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A token-based integration was connected (OAuth kinds connect out-of-band).
    IntegrationConnected { kind: String },
    /// An integration was removed by the user.
    IntegrationDisconnected { kind: String },
    /// A connectivity check ran; the backend may have flipped `is_valid`.
    IntegrationTested {
        kind: String,
        /// Status string reported by the backend, `"ok"` on success.
        status: String,
    },
    /// OAuth client credentials were stored for a kind.
    OAuthConfigSaved { kind: String },
    /// The browser came back from an OAuth consent screen.
    OAuthReturned { kind: Option<String> },
    /// A batch of staged files was accepted by the backend.
    UploadSubmitted { source_id: Id, version_count: usize },
    /// A retry for a failed upload settled, successfully or not.
    UploadRetried { upload_id: Id, succeeded: bool },
}

impl DomainEvent {
    pub fn touches_integrations(&self) -> bool {
        matches!(
            self,
            DomainEvent::IntegrationConnected { .. }
                | DomainEvent::IntegrationDisconnected { .. }
                | DomainEvent::IntegrationTested { .. }
                | DomainEvent::OAuthConfigSaved { .. }
                | DomainEvent::OAuthReturned { .. }
        )
    }

    pub fn touches_uploads(&self) -> bool {
        matches!(
            self,
            DomainEvent::UploadSubmitted { .. } | DomainEvent::UploadRetried { .. }
        )
    }
}

/// Trait for handling domain events.
/// Implementations can perform side effects like refetching cached lists,
/// logging, etc.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Publish an event to all registered handlers.
    ///
    /// Returns once every handler has finished, which callers use as the
    /// completion signal for "the affected lists have been refetched".
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
