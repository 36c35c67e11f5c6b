// ── Canonical domain model ──
//
// Backend payloads pass through `crate::convert` before landing in these
// types. Every struct is snake_case on the wire and keeps any field it does
// not name in `extra`, so nothing a backend reports is lost.

pub mod location;
pub mod payment;
pub mod reader;
pub mod update;

pub use location::{Address, Location, LocationList};
pub use payment::{PaymentIntent, PaymentMethod};
pub use reader::Reader;
pub use update::{FinishedUpdate, ReaderSoftwareUpdate};

pub use tillbridge_api::wire::{
    BatteryStatus, ConnectionStatus, DeviceStyle, DeviceType, DiscoveryMethod, LocationStatus,
    PaymentIntentStatus, PaymentStatus, ReaderDisplayMessage, ReaderInputOptions,
    ReaderNetworkStatus, SimulateReaderUpdate, SimulatedCardType,
};

use serde::{Deserialize, Deserializer};

/// Treat an explicit `null` like a missing field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
