use config::Config;
use log::info;

pub mod config;
pub mod logging;

/// Builds the shared HTTP client used for every backend call.
///
/// No request timeout is configured: callers own retry and abandonment
/// semantics, and uploads of large video files may legitimately run long.
pub fn init_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    info!(
        "HTTP client config: api_base_url={}, runtime_env={}",
        config.api_base_url(),
        config.runtime_env(),
    );

    reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(config.user_agent())
        .build()
}

// Service-level state containing only infrastructure concerns
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            config: app_config,
        }
    }

    pub fn api_root(&self) -> String {
        self.config.api_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_http_client_from_default_config() {
        let config = Config::default();
        assert!(init_http_client(&config).is_ok());
    }
}
