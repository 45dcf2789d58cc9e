//! Client-side state of the OAuth credentials form shown on an unconnected card.
//!
//! Secrets are write-only: nothing the backend returns is ever copied into
//! `client_id`, `client_secret` or `developer_token`.

use crate::error::{Error, ValidationErrorKind};
use crate::gateway::integrations::{OAuthConfigRequest, OAuthConfigResponse};
use crate::integration::{format_customer_id, IntegrationKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfigForm {
    kind: IntegrationKind,
    expanded: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub developer_token: String,
    pub login_customer_id: String,
    developer_token_saved: bool,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl OAuthConfigForm {
    pub fn new(kind: IntegrationKind) -> Self {
        Self {
            kind,
            expanded: false,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            developer_token: String::new(),
            login_customer_id: String::new(),
            developer_token_saved: false,
        }
    }

    pub fn kind(&self) -> IntegrationKind {
        self.kind
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    /// Opens the form. Returns `true` when it was collapsed, meaning the stored
    /// configuration flags should be (re)loaded.
    pub fn expand(&mut self) -> bool {
        let opened = !self.expanded;
        self.expanded = true;
        opened
    }

    /// Collapses the form and clears the client fields. Developer token state
    /// and the login customer id are left alone.
    pub fn cancel(&mut self) {
        self.expanded = false;
        self.client_id.clear();
        self.client_secret.clear();
        self.redirect_uri.clear();
    }

    /// Pre-fills the non-secret fields from the stored configuration.
    pub fn apply_loaded(&mut self, loaded: &OAuthConfigResponse) {
        if loaded.has_config {
            self.redirect_uri = loaded.redirect_uri.clone().unwrap_or_default();
        }
        self.developer_token_saved = loaded.has_developer_token.unwrap_or(false);
        self.login_customer_id = loaded.login_customer_id.clone().unwrap_or_default();
        self.developer_token.clear();
    }

    pub fn developer_token_saved(&self) -> bool {
        self.developer_token_saved
    }

    /// Whether to show the "developer token saved" indicator: a token is
    /// stored and the user has not typed a replacement.
    pub fn shows_saved_token_indicator(&self) -> bool {
        self.kind.requires_developer_token() && self.developer_token_saved && self.developer_token.is_empty()
    }

    /// The login customer id as displayed, grouped when it is ten digits.
    pub fn login_customer_id_display(&self) -> Option<String> {
        non_empty(&self.login_customer_id).map(|id| format_customer_id(&id))
    }

    /// Validates the form and builds the payload to save.
    ///
    /// Empty optional fields are omitted. The developer token and login
    /// customer id are only sent for kinds that need a developer token.
    pub fn to_request(&self) -> Result<OAuthConfigRequest, Error> {
        let (Some(client_id), Some(client_secret)) =
            (non_empty(&self.client_id), non_empty(&self.client_secret))
        else {
            return Err(Error::validation(ValidationErrorKind::MissingClientCredentials));
        };

        let mut request = OAuthConfigRequest {
            client_id,
            client_secret,
            redirect_uri: non_empty(&self.redirect_uri),
            developer_token: None,
            login_customer_id: None,
        };

        if self.kind.requires_developer_token() {
            request.developer_token = non_empty(&self.developer_token);
            request.login_customer_id = non_empty(&self.login_customer_id);
            if request.developer_token.is_none() && !self.developer_token_saved {
                return Err(Error::validation(ValidationErrorKind::MissingDeveloperToken));
            }
        }

        Ok(request)
    }

    /// Resets the form after a successful save of `sent`.
    pub fn mark_saved(&mut self, sent: &OAuthConfigRequest) {
        if self.kind.requires_developer_token() {
            self.developer_token_saved |= sent.developer_token.is_some();
        }
        self.expanded = false;
        self.client_id.clear();
        self.client_secret.clear();
        self.redirect_uri.clear();
        self.developer_token.clear();
        self.login_customer_id.clear();
    }
}
