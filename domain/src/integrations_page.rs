//! The integrations page: the integrations query plus one card per kind.

use crate::error::Error;
use crate::gateway::integrations::IntegrationList;
use crate::gateway::BackendClient;
use crate::integration::IntegrationKind;
use crate::integration_card::{CardView, IntegrationCard, Navigator};
use crate::query::{Fetcher, Query, QueryView, INTEGRATIONS_KEY};
use async_trait::async_trait;
use events::{DomainEvent, EventPublisher};
use log::*;
use std::sync::Arc;
use url::Url;

/// Query parameter the backend appends when redirecting back after OAuth.
pub const CONNECTED_PARAM: &str = "connected";

const LOAD_ERROR: &str = "Failed to load integrations. Try refreshing the page.";

pub struct IntegrationsFetcher {
    client: BackendClient,
}

impl IntegrationsFetcher {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher<IntegrationList> for IntegrationsFetcher {
    async fn fetch(&self) -> Result<IntegrationList, Error> {
        self.client.list_integrations().await
    }
}

pub fn integrations_query(client: BackendClient) -> Query<IntegrationList> {
    Query::new(INTEGRATIONS_KEY, Arc::new(IntegrationsFetcher::new(client)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    Loading,
    Error(String),
    Ready(Vec<CardView>),
}

/// Result of handling a URL the OAuth flow redirected back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthReturn {
    /// Kind named by the `connected` parameter, when it is a known kind.
    pub kind: Option<IntegrationKind>,
    /// The same URL without the `connected` parameter.
    pub cleaned_url: String,
}

pub struct IntegrationsPage {
    query: Arc<Query<IntegrationList>>,
    publisher: EventPublisher,
    cards: Vec<IntegrationCard>,
}

impl IntegrationsPage {
    /// `publisher` is expected to carry a handler that refreshes `query`.
    pub fn new(
        client: BackendClient,
        query: Arc<Query<IntegrationList>>,
        publisher: EventPublisher,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let cards = IntegrationKind::ALL
            .iter()
            .map(|kind| {
                IntegrationCard::new(
                    *kind,
                    None,
                    client.clone(),
                    publisher.clone(),
                    navigator.clone(),
                )
                .with_records(query.clone())
            })
            .collect();

        Self {
            query,
            publisher,
            cards,
        }
    }

    /// Cards in display order: youtube, gdrive, gads, telegram.
    pub fn cards(&self) -> &[IntegrationCard] {
        &self.cards
    }

    pub fn card(&self, kind: IntegrationKind) -> &IntegrationCard {
        // `cards` is built from `IntegrationKind::ALL`, in the same order.
        let index = IntegrationKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or_default();
        &self.cards[index]
    }

    /// Loads the list when needed and binds every card to it.
    pub async fn load(&self) -> QueryView {
        let snapshot = self.query.ensure_loaded().await;
        self.sync();
        snapshot.view()
    }

    /// Rebinds each card to the record of its kind in the current snapshot.
    pub fn sync(&self) {
        let snapshot = self.query.snapshot();
        let Some(list) = snapshot.data.as_ref() else {
            return;
        };
        for card in &self.cards {
            card.rebind(list);
        }
    }

    pub fn view(&self) -> PageView {
        let snapshot = self.query.snapshot();
        match snapshot.view() {
            QueryView::Loading => PageView::Loading,
            QueryView::Error => {
                if let Some(e) = &snapshot.error {
                    debug!("Integrations unavailable: {e}");
                }
                PageView::Error(LOAD_ERROR.to_string())
            }
            QueryView::Ready => PageView::Ready(self.cards.iter().map(IntegrationCard::view).collect()),
        }
    }

    /// Handles a URL the browser landed on after an OAuth consent screen.
    ///
    /// Returns `None` when the URL carries no `connected` parameter. Otherwise
    /// the integrations list is refreshed and the URL is returned with that
    /// parameter removed and every other parameter kept.
    pub async fn handle_return(&self, url: &str) -> Result<Option<OAuthReturn>, Error> {
        let mut parsed = Url::parse(url)?;

        let Some(connected) = parsed
            .query_pairs()
            .find(|(key, _)| key == CONNECTED_PARAM)
            .map(|(_, value)| value.into_owned())
        else {
            return Ok(None);
        };

        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| key != CONNECTED_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(&kept);
        }

        let kind = connected.parse::<IntegrationKind>().ok();
        info!("Returned from OAuth consent screen (connected={connected})");
        self.publisher
            .publish(DomainEvent::OAuthReturned {
                kind: kind.map(|k| k.to_string()),
            })
            .await;
        self.sync();

        Ok(Some(OAuthReturn {
            kind,
            cleaned_url: parsed.to_string(),
        }))
    }
}
