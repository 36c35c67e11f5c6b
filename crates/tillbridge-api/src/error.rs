use serde_json::Value;
use thiserror::Error;

/// Top-level error type for the `tillbridge-api` crate.
///
/// Covers every failure a backend can report: rejections from the native
/// bridge, transport and API failures from the payments REST client, and
/// translation failures in the browser SDK adapter. `tillbridge-core` wraps
/// these in its own `CoreError`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Backend rejections ──────────────────────────────────────────
    /// A backend rejected the call. `data` carries any structured payload
    /// the backend attached (decline code, payment intent).
    #[error("{message}")]
    Rejected {
        message: String,
        data: Option<Value>,
    },

    /// The backend has not finished initializing.
    #[error("Backend has not been initialized")]
    NotInitialized,

    /// A multi-step flow was invoked out of order (e.g. process before collect).
    #[error("{0}")]
    MissingState(&'static str),

    /// The connection-token exchange was rejected or abandoned.
    #[error("Connection token unavailable: {0}")]
    TokenUnavailable(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Payments API ────────────────────────────────────────────────
    /// Structured error returned by the payments REST API.
    #[error("Payments API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A wire value had no counterpart in the canonical enumeration.
    #[error("Unmapped {kind} value: {value}")]
    UnmappedValue { kind: &'static str, value: String },
}

impl Error {
    /// Shorthand for a rejection without structured data.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            data: None,
        }
    }

    /// Shorthand for an unmapped wire value.
    pub fn unmapped(kind: &'static str, value: impl ToString) -> Self {
        Self::UnmappedValue {
            kind,
            value: value.to_string(),
        }
    }

    /// The rejection message and structured data, when this is a rejection
    /// that carries both.
    pub fn structured_rejection(&self) -> Option<(&str, &Value)> {
        match self {
            Self::Rejected {
                message,
                data: Some(data),
            } if !message.is_empty() => Some((message.as_str(), data)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_rejection_requires_message_and_data() {
        let full = Error::Rejected {
            message: "Your card was declined.".into(),
            data: Some(json!({ "decline_code": "generic_decline" })),
        };
        assert!(full.structured_rejection().is_some());

        assert!(Error::rejected("no data").structured_rejection().is_none());

        let no_message = Error::Rejected {
            message: String::new(),
            data: Some(json!({})),
        };
        assert!(no_message.structured_rejection().is_none());
    }
}
