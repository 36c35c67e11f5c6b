// ── Backend capability contract ──
//
// Both SDK backends (the native bridge and the browser adapter) implement
// this one trait, so the routing layer never needs to know which concrete
// SDK it is talking to. Payloads are the bridge's camelCase JSON; shaping
// them into the canonical model is the normalizer's job, not the backend's.

use async_trait::async_trait;
use serde_json::Value;

use crate::channel::{Channel, Listener};
use crate::error::Error;
use crate::request::{
    BluetoothConnectionConfig, Cart, CollectConfig, DiscoveryConfig, HandoffConnectionConfig,
    InternetConnectionConfig, ListLocationsParams, LocalMobileConnectionConfig, ReaderRef,
    SimulatorConfiguration, UsbConnectionConfig,
};

/// Which of the two SDK implementations a backend is.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Mobile SDK reached through the plugin bridge.
    Native,
    /// Browser-hosted SDK.
    Web,
}

/// Capability set shared by both backends.
///
/// Results that carry a reader, payment intent or status come back as the
/// raw bridge payload (`{"reader": {...}}`, `{"intent": {...}}`,
/// `{"status": 1}`).
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn initialize(&self) -> Result<(), Error>;

    /// Attach a listener to one of this backend's event channels.
    fn add_listener(&self, channel: Channel) -> Listener;

    /// Answer an outstanding `requestConnectionToken` event. Exactly one of
    /// `token` / `error` is expected to be set.
    async fn set_connection_token(
        &self,
        token: Option<String>,
        error: Option<String>,
    ) -> Result<(), Error>;

    // ── Discovery ───────────────────────────────────────────────────

    /// Run a scan. Readers are reported on `readersDiscovered`; the call
    /// resolves when the scan ends.
    async fn discover_readers(&self, config: &DiscoveryConfig) -> Result<(), Error>;
    async fn cancel_discover_readers(&self) -> Result<(), Error>;

    // ── Connect ─────────────────────────────────────────────────────

    async fn connect_bluetooth_reader(
        &self,
        reader: &ReaderRef,
        config: &BluetoothConnectionConfig,
    ) -> Result<Value, Error>;
    async fn connect_usb_reader(
        &self,
        reader: &ReaderRef,
        config: &UsbConnectionConfig,
    ) -> Result<Value, Error>;
    async fn connect_handoff_reader(
        &self,
        reader: &ReaderRef,
        config: &HandoffConnectionConfig,
    ) -> Result<Value, Error>;
    async fn connect_local_mobile_reader(
        &self,
        reader: &ReaderRef,
        config: &LocalMobileConnectionConfig,
    ) -> Result<Value, Error>;
    async fn connect_internet_reader(
        &self,
        reader: &ReaderRef,
        config: &InternetConnectionConfig,
    ) -> Result<Value, Error>;

    // ── Reader state ────────────────────────────────────────────────

    async fn get_connected_reader(&self) -> Result<Value, Error>;
    async fn get_connection_status(&self) -> Result<Value, Error>;
    async fn get_payment_status(&self) -> Result<Value, Error>;
    async fn disconnect_reader(&self) -> Result<(), Error>;

    // ── Updates ─────────────────────────────────────────────────────

    async fn install_available_update(&self) -> Result<(), Error>;
    async fn cancel_install_update(&self) -> Result<(), Error>;
    async fn cancel_auto_reconnect(&self) -> Result<(), Error>;

    // ── Payments ────────────────────────────────────────────────────

    async fn retrieve_payment_intent(&self, client_secret: &str) -> Result<Value, Error>;
    async fn collect_payment_method(&self, config: Option<&CollectConfig>) -> Result<Value, Error>;
    async fn cancel_collect_payment_method(&self) -> Result<(), Error>;
    async fn process_payment(&self) -> Result<Value, Error>;

    // ── Reader display & housekeeping ───────────────────────────────

    async fn clear_cached_credentials(&self) -> Result<(), Error>;
    async fn set_reader_display(&self, cart: &Cart) -> Result<(), Error>;
    async fn clear_reader_display(&self) -> Result<(), Error>;
    async fn list_locations(&self, params: &ListLocationsParams) -> Result<Value, Error>;

    // ── Simulator ───────────────────────────────────────────────────

    async fn get_simulator_configuration(&self) -> Result<Value, Error>;
    async fn set_simulator_configuration(
        &self,
        config: &SimulatorConfiguration,
    ) -> Result<Value, Error>;
}
