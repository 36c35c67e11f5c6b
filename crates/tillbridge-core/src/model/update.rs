// ── Reader software updates ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReaderSoftwareUpdate {
    #[serde(default)]
    pub device_software_version: Option<String>,
    #[serde(default)]
    pub estimated_update_time: Option<Value>,
    #[serde(default)]
    pub required_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of an update install. Either side may be absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinishedUpdate {
    #[serde(default)]
    pub update: Option<ReaderSoftwareUpdate>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl FinishedUpdate {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
