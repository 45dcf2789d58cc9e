//! Observable cache for the backend lists the console renders.
//!
//! Each logical key (`integrations`, `uploads`) is one [`Query`] that publishes
//! [`Snapshot`]s over a `tokio::sync::watch` channel. Invalidation marks the
//! current snapshot stale at once; [`Query::refresh`] resolves only after the
//! refetched snapshot has been published. [`QueryInvalidationHandler`] wires
//! domain events to those two calls, so awaiting
//! `EventPublisher::publish` is the signal that affected lists are fresh.

use crate::error::Error;
use crate::gateway::integrations::IntegrationList;
use crate::gateway::uploads::UploadListResponse;
use async_trait::async_trait;
use events::{DomainEvent, EventHandler};
use log::*;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

pub const INTEGRATIONS_KEY: &str = "integrations";
pub const UPLOADS_KEY: &str = "uploads";

/// Loads the value behind one query key.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Last successfully fetched value; kept when a later refetch fails.
    pub data: Option<T>,
    /// Bumped on every completed fetch, successful or not. Zero until the
    /// first fetch resolves.
    pub version: u64,
    pub stale: bool,
    /// Message of the most recent failed fetch, cleared on success.
    pub error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            version: 0,
            stale: false,
            error: None,
        }
    }
}

/// What a page shows for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryView {
    Loading,
    Error,
    Ready,
}

impl<T> Snapshot<T> {
    pub fn view(&self) -> QueryView {
        match (&self.data, &self.error) {
            (Some(_), _) => QueryView::Ready,
            (None, Some(_)) => QueryView::Error,
            (None, None) => QueryView::Loading,
        }
    }
}

pub struct Query<T> {
    key: &'static str,
    fetcher: Arc<dyn Fetcher<T>>,
    sender: watch::Sender<Snapshot<T>>,
    // Serializes refetches so versions are published in order.
    refreshing: Mutex<()>,
}

impl<T> Query<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(key: &'static str, fetcher: Arc<dyn Fetcher<T>>) -> Self {
        let (sender, _) = watch::channel(Snapshot::default());
        Self {
            key,
            fetcher,
            sender,
            refreshing: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.sender.borrow().clone()
    }

    /// Marks the current snapshot stale without fetching.
    pub fn invalidate(&self) {
        debug!("Invalidating query '{}'", self.key);
        self.sender.send_modify(|snapshot| snapshot.stale = true);
    }

    /// Refetches and publishes the result, returning the new snapshot.
    pub async fn refresh(&self) -> Snapshot<T> {
        let _guard = self.refreshing.lock().await;

        let result = self.fetcher.fetch().await;
        self.sender.send_modify(|snapshot| {
            match result {
                Ok(data) => {
                    snapshot.data = Some(data);
                    snapshot.error = None;
                }
                Err(e) => {
                    warn!("Refetch of query '{}' failed: {e}", self.key);
                    snapshot.error = Some(e.message());
                }
            }
            snapshot.stale = false;
            snapshot.version += 1;
        });

        let snapshot = self.snapshot();
        debug!("Query '{}' now at version {}", self.key, snapshot.version);
        snapshot
    }

    /// Fetches on first use or when stale; otherwise returns the cached snapshot.
    pub async fn ensure_loaded(&self) -> Snapshot<T> {
        let current = self.snapshot();
        if current.version == 0 || current.stale {
            self.refresh().await
        } else {
            current
        }
    }
}

/// Invalidates and refetches the queries a domain event affects.
#[derive(Default)]
pub struct QueryInvalidationHandler {
    integrations: Option<Arc<Query<IntegrationList>>>,
    uploads: Option<Arc<Query<UploadListResponse>>>,
}

impl QueryInvalidationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integrations(mut self, query: Arc<Query<IntegrationList>>) -> Self {
        self.integrations = Some(query);
        self
    }

    pub fn with_uploads(mut self, query: Arc<Query<UploadListResponse>>) -> Self {
        self.uploads = Some(query);
        self
    }
}

#[async_trait]
impl EventHandler for QueryInvalidationHandler {
    async fn handle(&self, event: &DomainEvent) {
        debug!("Handling {event:?}");

        if let Some(query) = self.integrations.as_ref().filter(|_| event.touches_integrations()) {
            query.invalidate();
            query.refresh().await;
        }
        if let Some(query) = self.uploads.as_ref().filter(|_| event.touches_uploads()) {
            query.invalidate();
            query.refresh().await;
        }
    }
}
