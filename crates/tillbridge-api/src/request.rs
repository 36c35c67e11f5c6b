// ── Request payloads ──
//
// Arguments handed to a backend. These serialize to the camelCase shape the
// native bridge expects; enumerations travel as integer codes.

use serde::{Deserialize, Serialize};

use crate::wire::{DiscoveryMethod, SimulateReaderUpdate, SimulatedCardType};

// ── Discovery ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    pub discovery_method: DiscoveryMethod,
    #[serde(default)]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
}

impl DiscoveryConfig {
    pub fn new(discovery_method: DiscoveryMethod) -> Self {
        Self {
            discovery_method,
            simulated: false,
            location_id: None,
        }
    }

    #[must_use]
    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    #[must_use]
    pub fn location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }
}

// ── Connect ─────────────────────────────────────────────────────────

/// Identifies the reader to connect to. Serial number is always sent; the
/// network address and backend id only matter for internet readers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderRef {
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_id: Option<String>,
}

impl ReaderRef {
    pub fn serial(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            ..Self::default()
        }
    }
}

/// A connect call: the reader plus its kind-specific configuration,
/// flattened into one object on the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest<'a, C: Serialize> {
    pub serial_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_id: Option<&'a str>,
    #[serde(flatten)]
    pub config: &'a C,
}

impl<'a, C: Serialize> ConnectRequest<'a, C> {
    /// Bluetooth, USB, handoff and local-mobile connects identify the
    /// reader by serial number only.
    pub fn by_serial(reader: &'a ReaderRef, config: &'a C) -> Self {
        Self {
            serial_number: &reader.serial_number,
            ip_address: None,
            stripe_id: None,
            config,
        }
    }

    /// Internet connects also carry the network address and backend id.
    pub fn internet(reader: &'a ReaderRef, config: &'a C) -> Self {
        Self {
            serial_number: &reader.serial_number,
            ip_address: reader.ip_address.as_deref(),
            stripe_id: reader.stripe_id.as_deref(),
            config,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothConnectionConfig {
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_reconnect_on_unexpected_disconnect: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbConnectionConfig {
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffConnectionConfig {
    pub location_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMobileConnectionConfig {
    pub location_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_acceptance_permitted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternetConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_if_in_use: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_customer_cancel: Option<bool>,
}

// ── Payments ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TippingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligible_amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_tipping: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_payment_intent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipping: Option<TippingConfig>,
}

// ── Reader display ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub display_name: String,
    pub quantity: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub currency: String,
    pub tax: i64,
    pub total: i64,
    #[serde(default)]
    pub line_items: Vec<CartLineItem>,
}

// ── Locations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLocationsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_after: Option<String>,
}

// ── Simulator ───────────────────────────────────────────────────────

/// Simulated-reader behaviour. Used both as the request and, after
/// backend translation, as the reported configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_reader_update: Option<SimulateReaderUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulated_card: Option<SimulatedCardType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulated_tip_amount: Option<i64>,
}
