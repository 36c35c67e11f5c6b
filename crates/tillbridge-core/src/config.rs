// ── Terminal configuration ──
//
// Runtime settings for the facade. The embedding application builds this
// directly or loads it through `tillbridge-config`.

use serde::{Deserialize, Serialize};

use tillbridge_api::channel::DEFAULT_CHANNEL_CAPACITY;

/// Host platform the facade runs on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    /// Browser only; the registered backend is itself the browser SDK.
    #[default]
    Web,
}

impl Platform {
    /// Mobile platforms host the native SDK and may add the browser SDK
    /// alongside it for internet readers.
    pub fn is_native(self) -> bool {
        matches!(self, Self::Ios | Self::Android)
    }
}

/// Facade configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    pub platform: Platform,
    /// Buffered items per outgoing stream before producers wait.
    pub event_buffer: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            event_buffer: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl TerminalConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }
}
