//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a stable process exit code.

use miette::Diagnostic;
use thiserror::Error;

use tillbridge_config::ConfigError;
use tillbridge_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const DECLINED: i32 = 4;
    pub const BACKEND: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Settings file already exists at {path}")]
    #[diagnostic(
        code(tillbridge::config_exists),
        help("Pass --force to overwrite it.")
    )]
    ConfigExists { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(tillbridge::validation),
        help("Fix the value in the settings file or the matching TILLBRIDGE_ variable.")
    )]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(tillbridge::config),
        help("Run: tillbridge config show -v to see where settings are read from")
    )]
    Config(Box<figment::Error>),

    #[error("failed to serialize settings: {0}")]
    #[diagnostic(code(tillbridge::toml))]
    Toml(#[from] toml::ser::Error),

    // ── Terminal ─────────────────────────────────────────────────────

    #[error("Terminal is not initialized")]
    #[diagnostic(code(tillbridge::not_initialized))]
    NotInitialized,

    #[error("Payment declined: {message}")]
    #[diagnostic(
        code(tillbridge::declined),
        help("Decline code: {decline_code}")
    )]
    PaymentDeclined { message: String, decline_code: String },

    #[error("Backend error: {message}")]
    #[diagnostic(code(tillbridge::backend))]
    Backend { message: String },

    #[error("No readers found with {method} discovery")]
    #[diagnostic(
        code(tillbridge::no_readers),
        help("Try a different --method, or raise --readers above zero.")
    )]
    NoReaders { method: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(tillbridge::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigExists { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Toml(_) => exit_code::CONFIG,
            Self::PaymentDeclined { .. } => exit_code::DECLINED,
            Self::NotInitialized | Self::Backend { .. } | Self::NoReaders { .. } => {
                exit_code::BACKEND
            }
            Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Serialization(e) => Self::Toml(e),
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotInitialized => Self::NotInitialized,
            CoreError::Payment {
                message,
                decline_code,
                ..
            } => Self::PaymentDeclined {
                message,
                decline_code: decline_code.unwrap_or_else(|| "unknown".into()),
            },
            CoreError::Config { message } => Self::Validation {
                field: "backends".into(),
                reason: message,
            },
            other @ (CoreError::Backend(_) | CoreError::Parse { .. } | CoreError::ShutDown) => {
                Self::Backend {
                    message: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decline_maps_to_its_own_exit_code() {
        let err = CliError::from(CoreError::Payment {
            message: "Your card was declined.".into(),
            decline_code: Some("insufficient_funds".into()),
            payment_intent: None,
        });
        assert_eq!(err.exit_code(), exit_code::DECLINED);
        assert!(matches!(
            err,
            CliError::PaymentDeclined { ref decline_code, .. } if decline_code == "insufficient_funds"
        ));
    }

    #[test]
    fn settings_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "event_buffer".into(),
            reason: "must be at least 1".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
