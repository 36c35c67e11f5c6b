// ── Core error types ──
//
// Errors surfaced by the terminal facade. Backend rejections pass through
// untouched as `Backend`, except for payment processing, where a rejection
// that carries structured decline data is lifted into `Payment`.

use thiserror::Error;

use crate::model::PaymentIntent;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Terminal must be initialized before you can use any methods.")]
    NotInitialized,

    #[error("Terminal has been shut down.")]
    ShutDown,

    // ── Backend errors ───────────────────────────────────────────────
    /// A backend call was rejected; the backend's own error is preserved.
    #[error(transparent)]
    Backend(#[from] tillbridge_api::Error),

    /// Payment processing was declined or failed with structured data.
    #[error("{message}")]
    Payment {
        message: String,
        decline_code: Option<String>,
        payment_intent: Option<Box<PaymentIntent>>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Parse error: {message}")]
    Parse { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse {
            message: err.to_string(),
        }
    }
}

impl CoreError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        CoreError::Parse {
            message: message.into(),
        }
    }

    /// Decline code of a payment failure, if the backend supplied one.
    pub fn decline_code(&self) -> Option<&str> {
        match self {
            CoreError::Payment { decline_code, .. } => decline_code.as_deref(),
            _ => None,
        }
    }

    /// The backend error behind this one, when it is a pass-through.
    pub fn backend(&self) -> Option<&tillbridge_api::Error> {
        match self {
            CoreError::Backend(e) => Some(e),
            _ => None,
        }
    }
}
