// ── Payments REST client ──
//
// The browser SDK cannot fetch payment intents or list locations by itself;
// the adapter goes to the payments REST API directly, authenticated with the
// current connection token.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::request::ListLocationsParams;
use crate::transport::WebConfig;

/// Thin client for the two payments REST endpoints the browser backend needs.
#[derive(Debug, Clone)]
pub struct PaymentsClient {
    http: reqwest::Client,
    base_url: Url,
}

impl PaymentsClient {
    pub fn new(config: &WebConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            base_url: config.base_url()?,
        })
    }

    /// Wrap an existing `reqwest::Client` (shared pools, tests).
    pub fn with_client(http: reqwest::Client, config: &WebConfig) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: config.base_url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /v1/payment_intents/{id}?client_secret=…`. The intent id is the
    /// client secret's prefix before `_secret`.
    pub async fn retrieve_payment_intent(
        &self,
        client_secret: &str,
        token: &SecretString,
    ) -> Result<Value, Error> {
        let id = payment_intent_id(client_secret);
        let mut url = self.base_url.join(&format!("v1/payment_intents/{id}"))?;
        url.query_pairs_mut()
            .append_pair("client_secret", client_secret);
        self.get(url, token).await
    }

    /// `GET /v1/terminal/locations` with optional pagination.
    pub async fn list_locations(
        &self,
        params: &ListLocationsParams,
        token: &SecretString,
    ) -> Result<Value, Error> {
        let mut url = self.base_url.join("v1/terminal/locations")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(limit) = params.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(ref cursor) = params.ending_before {
                query.append_pair("ending_before", cursor);
            }
            if let Some(ref cursor) = params.starting_after {
                query.append_pair("starting_after", cursor);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        self.get(url, token).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, token: &SecretString) -> Result<T, Error> {
        debug!("GET {}", url.path());

        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// The payment intent id embedded in a client secret.
pub fn payment_intent_id(client_secret: &str) -> &str {
    client_secret
        .split("_secret")
        .next()
        .unwrap_or(client_secret)
}

/// Pull `error.message` out of an API error body, falling back to the body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.to_owned())
}
