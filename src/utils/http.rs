//! HTTP client utilities.

use reqwest::redirect::Policy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::from_config(&HttpConfig::default())
    }

    /// Create a client honouring the configured timeouts and user agent
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        Self::with_redirect_policy(config, Policy::default())
    }

    /// Like [`HttpClient::from_config`], with a custom policy for following redirects
    pub fn with_redirect_policy(config: &HttpConfig, policy: Policy) -> Result<Self, SourceError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| default_user_agent().to_string());

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(policy)
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        tracing::debug!(url = %url, "GET");
        self.client.get(url)
    }
}

fn default_user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}
