//! One card on the integrations page: a single kind, its backend record and
//! the connect / test / disconnect / OAuth-config actions.
//!
//! A card runs at most one action at a time, tracked by [`CardActivity`].
//! Starting a second one fails with `InternalErrorKind::Busy` before any
//! request is sent. Failures are recorded as the card's inline error and
//! returned to the caller. The integration record is never edited locally:
//! it is rebound from the integrations query after every event the card
//! publishes, or by the page.

use crate::error::{Error, ValidationErrorKind};
use crate::gateway::integrations::{Integration, IntegrationList};
use crate::gateway::BackendClient;
use crate::integration::{account_label, account_secondary, IntegrationKind, IntegrationStatus, ServiceInfo};
use crate::oauth_config::OAuthConfigForm;
use crate::query::Query;
use chrono::NaiveDate;
use events::{DomainEvent, EventPublisher};
use log::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DEFAULT_TEST_SUCCESS: &str = "Connection is working";
const DEFAULT_TEST_FAILURE: &str = "Connection check failed";

/// Sends the user to an OAuth consent screen.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str);
}

/// Asks the user a yes/no question before a destructive action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardActivity {
    Idle,
    Connecting,
    Testing,
    Disconnecting,
    LoadingConfig,
    SavingConfig,
}

impl CardActivity {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            CardActivity::Idle => None,
            CardActivity::Connecting => Some("Connecting..."),
            CardActivity::Testing => Some("Checking..."),
            CardActivity::Disconnecting => Some("Disconnecting..."),
            CardActivity::LoadingConfig => Some("Loading settings..."),
            CardActivity::SavingConfig => Some("Saving..."),
        }
    }
}

/// Buttons a card offers in its current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAction {
    Connect,
    ConfigureOAuth,
    Test,
    Reconnect,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The authorization URL was handed to the navigator.
    Redirected { authorization_url: String },
    /// A token-based integration was connected directly.
    Connected { message: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    Disconnected,
    Declined,
}

/// Everything needed to render a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub kind: IntegrationKind,
    pub info: ServiceInfo,
    pub status: IntegrationStatus,
    pub activity: CardActivity,
    pub account_label: Option<String>,
    pub account_secondary: Option<String>,
    pub connected_since: Option<NaiveDate>,
    pub error: Option<String>,
    pub notice: Option<String>,
    pub actions: Vec<CardAction>,
    pub shows_token_input: bool,
    /// The credentials form, when expanded.
    pub config_form: Option<OAuthConfigForm>,
}

#[derive(Debug)]
struct CardState {
    integration: Option<Integration>,
    activity: CardActivity,
    error: Option<String>,
    notice: Option<String>,
    telegram_token: String,
    config: OAuthConfigForm,
}

/// Resets the card to `Idle` when the action it guards settles.
struct ActivityGuard<'a> {
    state: &'a Mutex<CardState>,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).activity = CardActivity::Idle;
    }
}

fn lock(state: &Mutex<CardState>) -> MutexGuard<'_, CardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct IntegrationCard {
    kind: IntegrationKind,
    client: BackendClient,
    publisher: EventPublisher,
    navigator: Arc<dyn Navigator>,
    records: Option<Arc<Query<IntegrationList>>>,
    state: Mutex<CardState>,
}

impl IntegrationCard {
    pub fn new(
        kind: IntegrationKind,
        integration: Option<Integration>,
        client: BackendClient,
        publisher: EventPublisher,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            kind,
            client,
            publisher,
            navigator,
            records: None,
            state: Mutex::new(CardState {
                integration,
                activity: CardActivity::Idle,
                error: None,
                notice: None,
                telegram_token: String::new(),
                config: OAuthConfigForm::new(kind),
            }),
        }
    }

    /// Rebinds the card from `records` after each event it publishes.
    /// `records` should be refreshed by a handler on the card's publisher.
    pub fn with_records(mut self, records: Arc<Query<IntegrationList>>) -> Self {
        self.records = Some(records);
        self
    }

    pub fn kind(&self) -> IntegrationKind {
        self.kind
    }

    pub fn status(&self) -> IntegrationStatus {
        IntegrationStatus::of(lock(&self.state).integration.as_ref())
    }

    pub fn activity(&self) -> CardActivity {
        lock(&self.state).activity
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Rebinds the card to the latest backend record for its kind.
    pub fn set_integration(&self, integration: Option<Integration>) {
        lock(&self.state).integration = integration;
    }

    /// Rebinds the card to its kind's record in `list`, or to none.
    pub fn rebind(&self, list: &IntegrationList) {
        self.set_integration(list.find(self.kind).cloned());
    }

    pub fn set_telegram_token(&self, token: impl Into<String>) {
        lock(&self.state).telegram_token = token.into();
    }

    /// Applies user edits to the credentials form.
    pub fn edit_config_form(&self, edit: impl FnOnce(&mut OAuthConfigForm)) {
        edit(&mut lock(&self.state).config);
    }

    pub fn cancel_config_form(&self) {
        lock(&self.state).config.cancel();
    }

    pub fn view(&self) -> CardView {
        let state = lock(&self.state);
        let info = self.kind.info();
        let status = IntegrationStatus::of(state.integration.as_ref());
        let integration = state.integration.as_ref();

        let actions = match status {
            IntegrationStatus::Disconnected if info.oauth => {
                vec![CardAction::ConfigureOAuth, CardAction::Connect]
            }
            IntegrationStatus::Disconnected => vec![CardAction::Connect],
            IntegrationStatus::Active => vec![CardAction::Test, CardAction::Disconnect],
            IntegrationStatus::Error => vec![
                CardAction::Test,
                CardAction::Reconnect,
                CardAction::Disconnect,
            ],
        };

        CardView {
            kind: self.kind,
            info,
            status,
            activity: state.activity,
            account_label: integration.and_then(|i| account_label(self.kind, i)),
            account_secondary: integration.and_then(|i| account_secondary(self.kind, i)),
            connected_since: integration.map(|i| i.created_at.date_naive()),
            error: state.error.clone(),
            notice: state.notice.clone(),
            actions,
            shows_token_input: !info.oauth && status != IntegrationStatus::Active,
            config_form: state.config.is_expanded().then(|| state.config.clone()),
        }
    }

    /// Claims the card for `activity`, checking it is idle and that the
    /// action is legal for the current status.
    fn begin(&self, activity: CardActivity) -> Result<ActivityGuard<'_>, Error> {
        let mut state = lock(&self.state);
        if state.activity != CardActivity::Idle {
            debug!(
                "{} card busy ({:?}), refusing {activity:?}",
                self.kind, state.activity
            );
            return Err(Error::busy());
        }

        let status = IntegrationStatus::of(state.integration.as_ref());
        let allowed = match activity {
            CardActivity::Idle => true,
            CardActivity::Connecting => status != IntegrationStatus::Active,
            CardActivity::Testing | CardActivity::Disconnecting => state.integration.is_some(),
            CardActivity::LoadingConfig | CardActivity::SavingConfig => {
                self.kind.is_oauth() && state.integration.is_none()
            }
        };
        if !allowed {
            return Err(Error::validation(ValidationErrorKind::UnsupportedOperation));
        }

        state.activity = activity;
        if activity != CardActivity::LoadingConfig {
            state.error = None;
            state.notice = None;
        }
        Ok(ActivityGuard { state: &self.state })
    }

    /// Records `err` as the inline error and hands it back.
    fn fail(&self, err: Error) -> Error {
        lock(&self.state).error = Some(err.message());
        err
    }

    async fn publish(&self, event: DomainEvent) {
        self.publisher.publish(event).await;

        if let Some(records) = &self.records {
            if let Some(list) = records.snapshot().data.as_ref() {
                self.rebind(list);
            }
        }
    }

    /// Connects (or reconnects) the integration.
    ///
    /// OAuth kinds hand the authorization URL to the navigator. Telegram
    /// submits the bot token entered with [`Self::set_telegram_token`].
    pub async fn connect(&self) -> Result<ConnectOutcome, Error> {
        if self.kind.is_oauth() {
            self.connect_oauth().await
        } else {
            self.connect_with_token().await
        }
    }

    async fn connect_oauth(&self) -> Result<ConnectOutcome, Error> {
        let _guard = self.begin(CardActivity::Connecting)?;

        let authorize = self
            .client
            .oauth_authorize_url(self.kind)
            .await
            .map_err(|e| self.fail(e))?;

        info!("Redirecting to {} consent screen", self.kind.info().name);
        self.navigator.navigate(&authorize.authorization_url);
        Ok(ConnectOutcome::Redirected {
            authorization_url: authorize.authorization_url,
        })
    }

    async fn connect_with_token(&self) -> Result<ConnectOutcome, Error> {
        let token = lock(&self.state).telegram_token.trim().to_string();
        if token.is_empty() {
            return Err(self.fail(Error::validation(ValidationErrorKind::MissingBotToken)));
        }

        let guard = self.begin(CardActivity::Connecting)?;
        let connected = self
            .client
            .connect_telegram(&token)
            .await
            .map_err(|e| self.fail(e))?;

        lock(&self.state).telegram_token.clear();
        self.publish(DomainEvent::IntegrationConnected {
            kind: self.kind.to_string(),
        })
        .await;
        drop(guard);

        Ok(ConnectOutcome::Connected {
            message: connected.message,
        })
    }

    /// Expands the credentials form and, when it was collapsed, loads the
    /// stored flags into it. Load failures (e.g. nothing configured yet) are
    /// ignored.
    pub async fn open_config_form(&self) -> Result<(), Error> {
        if !self.kind.is_oauth() || lock(&self.state).integration.is_some() {
            return Err(Error::validation(ValidationErrorKind::UnsupportedOperation));
        }
        if !lock(&self.state).config.expand() {
            return Ok(());
        }

        let _guard = self.begin(CardActivity::LoadingConfig)?;
        match self.client.get_oauth_config(self.kind).await {
            Ok(loaded) => lock(&self.state).config.apply_loaded(&loaded),
            Err(e) => debug!("No stored OAuth configuration for {}: {e}", self.kind),
        }
        Ok(())
    }

    /// Validates and saves the credentials form, then starts the OAuth flow.
    ///
    /// The connect step runs only after the integrations list has been
    /// refetched and, when the card has records attached, after the card is
    /// rebound to the record the save created.
    pub async fn save_config(&self) -> Result<ConnectOutcome, Error> {
        let request = {
            let state = lock(&self.state);
            if state.activity != CardActivity::Idle {
                return Err(Error::busy());
            }
            state.config.to_request()
        };
        let request = request.map_err(|e| self.fail(e))?;

        let guard = self.begin(CardActivity::SavingConfig)?;
        self.client
            .save_oauth_config(self.kind, &request)
            .await
            .map_err(|e| self.fail(e))?;
        lock(&self.state).config.mark_saved(&request);
        drop(guard);

        self.publish(DomainEvent::OAuthConfigSaved {
            kind: self.kind.to_string(),
        })
        .await;

        self.connect().await
    }

    /// Runs the backend connectivity check. A non-`ok` status becomes the
    /// inline error; both outcomes refresh the integrations list.
    pub async fn test(&self) -> Result<TestOutcome, Error> {
        let _guard = self.begin(CardActivity::Testing)?;

        let result = self
            .client
            .test_integration(self.kind)
            .await
            .map_err(|e| self.fail(e))?;

        let outcome = {
            let mut state = lock(&self.state);
            if result.is_ok() {
                let text = result
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEST_SUCCESS.to_string());
                state.notice = Some(text.clone());
                TestOutcome::Passed(text)
            } else {
                let text = result
                    .message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEST_FAILURE.to_string());
                state.error = Some(text.clone());
                TestOutcome::Failed(text)
            }
        };

        self.publish(DomainEvent::IntegrationTested {
            kind: self.kind.to_string(),
            status: result.status,
        })
        .await;
        Ok(outcome)
    }

    /// Disconnects after `confirm` agrees. Declining sends nothing.
    pub async fn disconnect(&self, confirm: &dyn Confirm) -> Result<DisconnectOutcome, Error> {
        let _guard = self.begin(CardActivity::Disconnecting)?;

        let prompt = format!("Disconnect the {} integration?", self.kind.info().name);
        if !confirm.confirm(&prompt) {
            debug!("Disconnect of {} declined", self.kind);
            return Ok(DisconnectOutcome::Declined);
        }

        self.client
            .disconnect_integration(self.kind)
            .await
            .map_err(|e| self.fail(e))?;

        self.publish(DomainEvent::IntegrationDisconnected {
            kind: self.kind.to_string(),
        })
        .await;
        Ok(DisconnectOutcome::Disconnected)
    }
}
