//! JWT-bearer grant exchange.
//!
//! One POST per invocation, no retries and no caching. The response's
//! `id_token` is the bearer token; `access_token` and `expires_in` are
//! ignored because the proxy only accepts ID tokens.

use std::time::Duration;

use log::{debug, error};
use serde::Deserialize;

use crate::BearerToken;
use crate::assertion::{SignedAssertion, TOKEN_URI};
use crate::error::ClientError;

/// Grant type for exchanging a signed assertion.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Timeout applied to the exchange when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Exchanges signed assertions for ID tokens at the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    http: reqwest::Client,
    token_uri: String,
}

impl TokenExchanger {
    /// Creates an exchanger posting to [`TOKEN_URI`] with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            http,
            token_uri: TOKEN_URI.to_string(),
        })
    }

    /// Set a custom token endpoint.
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// The endpoint assertions are posted to.
    #[must_use]
    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Posts `assertion` and returns the ID token from the response.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ExchangeUnavailable`] on transport failure or
    /// timeout, and [`ClientError::ExchangeRejected`] for a non-2xx status,
    /// an unparseable body, or a body without `id_token`.
    pub async fn exchange(&self, assertion: SignedAssertion) -> Result<BearerToken, ClientError> {
        debug!(
            "Exchanging assertion for {} at {}",
            assertion.claims().target_audience,
            self.token_uri
        );

        let params = [
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.expose()),
        ];

        let response = self
            .http
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                error!("Token request to {} failed: {e}", self.token_uri);
                ClientError::ExchangeUnavailable(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(ClientError::ExchangeUnavailable)?;
        debug!("Token endpoint answered with status {}", status.as_u16());

        if !status.is_success() {
            error!(
                "Token exchange failed with status {}: {}",
                status.as_u16(),
                body.chars().take(500).collect::<String>()
            );
            return Err(ClientError::ExchangeRejected {
                status: Some(status.as_u16()),
                reason: "token endpoint returned an error status".to_string(),
                body,
            });
        }

        parse_token_response(status.as_u16(), body)
    }
}

fn parse_token_response(status: u16, body: String) -> Result<BearerToken, ClientError> {
    let parsed = match serde_json::from_str::<TokenResponse>(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Err(ClientError::ExchangeRejected {
                status: Some(status),
                reason: format!("unparseable token response: {e}"),
                body,
            });
        }
    };

    match parsed.id_token.filter(|t| !t.is_empty()) {
        Some(token) => Ok(BearerToken::new(token)),
        None => Err(ClientError::ExchangeRejected {
            status: Some(status),
            reason: "token response has no id_token".to_string(),
            body,
        }),
    }
}
