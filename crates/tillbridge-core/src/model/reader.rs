// ── Reader domain type ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::nullable;
use tillbridge_api::wire::{
    BatteryStatus, DeviceStyle, DeviceType, LocationStatus, ReaderNetworkStatus,
};

/// A card reader as either backend reports it, in canonical form.
///
/// Readers are snapshots: each discovery emission replaces the previous list
/// from the same backend wholesale.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Reader {
    #[serde(default, deserialize_with = "nullable")]
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub device_type: DeviceType,
    #[serde(default, deserialize_with = "nullable")]
    pub status: ReaderNetworkStatus,
    #[serde(default, deserialize_with = "nullable")]
    pub battery_status: BatteryStatus,
    /// Charge fraction. A reported level of exactly 0 means "unknown" and is
    /// stored as `None`.
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub is_charging: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub location_status: LocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub device_software_version: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub livemode: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reader {
    pub fn style(&self) -> DeviceStyle {
        crate::convert::device_style(self.device_type)
    }

    pub fn is_online(&self) -> bool {
        matches!(self.status, ReaderNetworkStatus::Online)
    }
}
