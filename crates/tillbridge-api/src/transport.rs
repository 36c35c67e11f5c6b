// HTTP transport settings for the browser backend's payments REST client.

use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Base URL of the hosted payments API.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/";

/// Settings for the browser backend: where the payments REST API lives and
/// how long a single request may take.
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl WebConfig {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse the API base, forcing a trailing `/` so relative joins append
    /// instead of replacing the last path segment.
    pub fn base_url(&self) -> Result<Url, Error> {
        let mut url = Url::parse(&self.api_base)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("tillbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(client)
    }
}
