// Contract of the browser-hosted terminal SDK as the adapter consumes it.
//
// The SDK itself lives in the host page; an embedding supplies an
// implementation of `BrowserSdk` that forwards to it. Payloads keep the
// SDK's own snake_case shape. SDK-level failures (`{error: {...}}`
// results) are reported as `Error::Rejected` with the SDK error object as
// `data`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Reader object as the browser SDK reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdkReader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Either an expanded location object or a bare location id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_sw_version: Option<String>,
    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkDiscoveryConfig {
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkSimulatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip_amount: Option<i64>,
}

/// Callbacks the SDK invokes on the adapter.
#[async_trait]
pub trait SdkHooks: Send + Sync {
    /// The SDK needs a fresh connection token.
    async fn fetch_connection_token(&self) -> Result<String, Error>;
    fn unexpected_reader_disconnect(&self);
    fn connection_status_changed(&self, status: &str);
    fn payment_status_changed(&self, status: &str);
}

/// The browser terminal SDK.
#[async_trait]
pub trait BrowserSdk: Send + Sync {
    /// Load the SDK and create the terminal instance wired to `hooks`.
    async fn create(&self, hooks: Arc<dyn SdkHooks>) -> Result<(), Error>;

    async fn discover_readers(&self, config: &SdkDiscoveryConfig) -> Result<Vec<SdkReader>, Error>;
    async fn connect_reader(
        &self,
        reader: &SdkReader,
        fail_if_in_use: Option<bool>,
    ) -> Result<SdkReader, Error>;
    fn connected_reader(&self) -> Option<SdkReader>;
    fn connection_status(&self) -> String;
    fn payment_status(&self) -> String;
    async fn disconnect_reader(&self) -> Result<(), Error>;

    /// Returns the updated payment intent object.
    async fn collect_payment_method(
        &self,
        client_secret: &str,
        options: &Value,
    ) -> Result<Value, Error>;
    async fn cancel_collect_payment_method(&self) -> Result<(), Error>;
    /// Returns the processed payment intent object.
    async fn process_payment(&self, payment_intent: &Value) -> Result<Value, Error>;

    async fn clear_cached_credentials(&self) -> Result<(), Error>;
    async fn set_reader_display(&self, display: &Value) -> Result<(), Error>;
    async fn clear_reader_display(&self) -> Result<(), Error>;

    fn simulator_configuration(&self) -> SdkSimulatorConfig;
    fn set_simulator_configuration(&self, config: &SdkSimulatorConfig);
}
