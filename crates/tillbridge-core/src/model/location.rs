// ── Terminal locations ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::nullable;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "nullable")]
    pub stripe_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub livemode: bool,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of locations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationList {
    #[serde(default, deserialize_with = "nullable")]
    pub locations: Vec<Location>,
    #[serde(default, deserialize_with = "nullable")]
    pub has_more: bool,
}
