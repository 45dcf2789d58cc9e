//! Integration endpoints: listing, OAuth configuration and the
//! connect / test / disconnect lifecycle.

use super::BackendClient;
use crate::error::Error;
use crate::integration::IntegrationKind;
use chrono::{DateTime, Utc};
use log::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A connected integration as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub kind: IntegrationKind,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_details: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrationList {
    pub integrations: Vec<Integration>,
}

impl IntegrationList {
    pub fn find(&self, kind: IntegrationKind) -> Option<&Integration> {
        self.integrations.iter().find(|i| i.kind == kind)
    }
}

#[derive(Debug, Serialize)]
struct ConnectTelegramRequest<'a> {
    bot_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisconnectResponse {
    pub kind: String,
    pub status: String,
}

/// Result of a backend connectivity check.
#[derive(Debug, Clone, Deserialize)]
pub struct TestResponse {
    pub kind: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl TestResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthAuthorizeResponse {
    pub authorization_url: String,
    pub state: String,
}

/// Client credentials to store for an OAuth kind. Write-only: the backend
/// never returns these values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OAuthConfigRequest {
    pub client_id: String,
    pub client_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub developer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_customer_id: Option<String>,
}

/// Non-secret view of a stored OAuth configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OAuthConfigResponse {
    #[serde(default)]
    pub kind: String,
    pub has_config: bool,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub has_developer_token: Option<bool>,
    #[serde(default)]
    pub login_customer_id: Option<String>,
}

impl BackendClient {
    pub async fn list_integrations(&self) -> Result<IntegrationList, Error> {
        let url = self.url("/integrations/");
        debug!("Listing integrations");

        self.send_json(self.http().get(&url), "Failed to load integrations")
            .await
    }

    /// Fetches one integration; a 404 means the kind is not connected.
    pub async fn get_integration(&self, kind: IntegrationKind) -> Result<Option<Integration>, Error> {
        const FALLBACK: &str = "Failed to load integration";
        let url = self.url(&format!("/integrations/{kind}"));

        let response = self.send(self.http().get(&url), FALLBACK).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("No {kind} integration connected");
            return Ok(None);
        }
        Self::read_json(response, FALLBACK).await.map(Some)
    }

    pub async fn oauth_authorize_url(
        &self,
        kind: IntegrationKind,
    ) -> Result<OAuthAuthorizeResponse, Error> {
        let url = self.url(&format!("/integrations/{kind}/oauth/authorize"));

        let authorize: OAuthAuthorizeResponse = self
            .send_json(self.http().get(&url), "Failed to get OAuth URL")
            .await?;
        info!("Received {kind} authorization URL");
        Ok(authorize)
    }

    pub async fn connect_telegram(&self, bot_token: &str) -> Result<ConnectResponse, Error> {
        let url = self.url("/integrations/telegram/connect");

        let request = self
            .http()
            .post(&url)
            .json(&ConnectTelegramRequest { bot_token });
        let connected: ConnectResponse =
            self.send_json(request, "Failed to connect Telegram").await?;
        info!("Connected telegram integration: {}", connected.status);
        Ok(connected)
    }

    pub async fn disconnect_integration(
        &self,
        kind: IntegrationKind,
    ) -> Result<DisconnectResponse, Error> {
        let url = self.url(&format!("/integrations/{kind}"));

        let disconnected: DisconnectResponse = self
            .send_json(self.http().delete(&url), "Failed to disconnect integration")
            .await?;
        info!("Disconnected {kind} integration");
        Ok(disconnected)
    }

    pub async fn test_integration(&self, kind: IntegrationKind) -> Result<TestResponse, Error> {
        let url = self.url(&format!("/integrations/{kind}/test"));

        let result: TestResponse = self
            .send_json(self.http().post(&url), "Failed to check the connection")
            .await?;
        debug!("Connectivity check for {kind}: {}", result.status);
        Ok(result)
    }

    pub async fn get_oauth_config(&self, kind: IntegrationKind) -> Result<OAuthConfigResponse, Error> {
        let url = self.url(&format!("/integrations/{kind}/oauth/config"));

        self.send_json(self.http().get(&url), "Failed to load OAuth configuration")
            .await
    }

    pub async fn save_oauth_config(
        &self,
        kind: IntegrationKind,
        config: &OAuthConfigRequest,
    ) -> Result<OAuthConfigResponse, Error> {
        let url = self.url(&format!("/integrations/{kind}/oauth/config"));

        let saved: OAuthConfigResponse = self
            .send_json(
                self.http().post(&url).json(config),
                "Failed to save OAuth configuration",
            )
            .await?;
        info!("Saved OAuth configuration for {kind}");
        Ok(saved)
    }
}
