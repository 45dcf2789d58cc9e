use crate::error::Error;
use log::*;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use service::AppState;

/// Shape of a backend rejection body: `{"detail": "..."}`.
///
/// `detail` is kept as a raw value because validation failures send a list
/// of objects there instead of a string.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Value,
}

/// HTTP client bound to one backend's versioned API root.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    api_root: String,
}

impl BackendClient {
    /// `api_root` is the versioned root, e.g. `http://localhost:8000/api/v1`.
    pub fn new(client: reqwest::Client, api_root: impl Into<String>) -> Self {
        Self {
            client,
            api_root: api_root.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_state(app_state: &AppState) -> Self {
        Self::new(app_state.http_client.clone(), app_state.api_root())
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Sends the request, mapping transport failures to
    /// `ExternalErrorKind::Network` with the endpoint's `fallback` message.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        fallback: &'static str,
    ) -> Result<Response, Error> {
        request.send().await.map_err(|e| {
            warn!("{fallback}: {e:?}");
            Error::from(e).with_fallback(fallback)
        })
    }

    /// `send` followed by `read_json`, for endpoints without special statuses.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        fallback: &'static str,
    ) -> Result<T, Error> {
        let response = self.send(request, fallback).await?;
        Self::read_json(response, fallback).await
    }

    /// Decodes a 2xx JSON body or turns a non-2xx response into a backend error.
    pub(crate) async fn read_json<T: DeserializeOwned>(
        response: Response,
        fallback: &'static str,
    ) -> Result<T, Error> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::rejection(response, fallback).await);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from(e).with_fallback(fallback))?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("Failed to parse backend response ({status}): {e:?}");
            Error::from(e).with_fallback(fallback)
        })
    }

    /// Builds the error for a non-2xx response, preferring the backend's `detail`.
    pub(crate) async fn rejection(response: Response, fallback: &'static str) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = Self::detail_from_body(&body);

        match status {
            StatusCode::NOT_FOUND => debug!("Backend returned 404: {body}"),
            _ => error!("Backend rejected request ({status}): {body}"),
        }

        Error::backend(status, detail, fallback)
    }

    fn detail_from_body(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.detail.as_str().map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_root_is_normalized() {
        let client = BackendClient::new(reqwest::Client::new(), "http://localhost:8000/api/v1/");
        assert_eq!(client.api_root(), "http://localhost:8000/api/v1");
        assert_eq!(
            client.url("/uploads/"),
            "http://localhost:8000/api/v1/uploads/"
        );
    }

    #[test]
    fn detail_is_read_only_when_it_is_a_string() {
        assert_eq!(
            BackendClient::detail_from_body(r#"{"detail":"Integration not found"}"#).as_deref(),
            Some("Integration not found")
        );
        assert_eq!(
            BackendClient::detail_from_body(r#"{"detail":[{"loc":["body"],"msg":"field required"}]}"#),
            None
        );
        assert_eq!(BackendClient::detail_from_body(r#"{"error":"nope"}"#), None);
        assert_eq!(BackendClient::detail_from_body("<html>Bad Gateway</html>"), None);
    }
}
