//! Error types for the client library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while minting an IAP token.
///
/// Every variant is terminal for the invocation; nothing here is retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The credential file could not be read.
    #[error("Failed to read credential file {}: {source}", path.display())]
    CredentialRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The credential file or its private key is unusable.
    ///
    /// Covers malformed service account JSON, bad PEM, unsupported PEM block
    /// types, non-RSA keys and keys that fail the consistency check.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Producing the RS256 signature failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Client configuration issue, e.g. the HTTP client couldn't be built.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The token endpoint could not be reached, or the request timed out.
    #[error("Token exchange unavailable: {0}")]
    ExchangeUnavailable(#[source] reqwest::Error),

    /// The token endpoint answered, but not with a usable ID token.
    ///
    /// `body` is the raw response, kept for diagnostics.
    #[error("Token exchange rejected{}: {reason}: {body}", http_status(.status))]
    ExchangeRejected {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// What was wrong with the response.
        reason: String,
        /// Raw response body.
        body: String,
    },
}

#[allow(clippy::ref_option)]
fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl ClientError {
    /// Check if this error came from the token endpoint.
    pub const fn is_exchange_error(&self) -> bool {
        matches!(
            self,
            Self::ExchangeUnavailable(_) | Self::ExchangeRejected { .. }
        )
    }

    /// The raw token endpoint response, if one was received.
    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::ExchangeRejected { body, .. } => Some(body),
            _ => None,
        }
    }
}
