// ── Payment intent view ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::nullable;
use tillbridge_api::wire::PaymentIntentStatus;

/// Payment method attached to an intent: either the bare `pm_` identifier
/// or the expanded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PaymentMethod {
    Id(String),
    Details(Map<String, Value>),
}

impl PaymentMethod {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Details(map) => map.get("id").and_then(Value::as_str),
        }
    }
}

/// Canonical payment intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_id: Option<String>,
    /// Creation time in seconds since the epoch, as the backend reports it.
    #[serde(default)]
    pub created: Option<f64>,
    #[serde(default)]
    pub status: Option<PaymentIntentStatus>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub amount_details: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub charges: Vec<Value>,
    /// Host-supplied metadata; keys are preserved exactly.
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentIntent {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created?.trunc() as i64, 0)
    }
}
