//! # iap-curl-client
//!
//! Mints identity tokens for apps behind Google Cloud Identity-Aware Proxy.
//!
//! A token is minted in two steps:
//! - [`AssertionSigner`] builds a one hour RS256 assertion from a service
//!   account key, naming the protected app as `target_audience`
//! - [`TokenExchanger`] trades the assertion for an ID token at the OAuth
//!   token endpoint
//!
//! [`IapTokenProvider`] runs both for a credential file and audience ID.
//! Nothing is cached: every call mints a fresh token.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use iap_curl_client::{IapTokenProvider, TokenProvider, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> Result<(), iap_curl_client::ClientError> {
//! let provider = IapTokenProvider::new(DEFAULT_TIMEOUT)?;
//! let token = provider
//!     .fetch_token(Path::new("/path/to/sa.json"), "1234.apps.googleusercontent.com")
//!     .await?;
//! println!("{}", token.authorization_header());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

pub mod assertion;
pub mod credentials;
pub mod error;
pub mod exchange;

pub use assertion::{
    ASSERTION_LIFETIME_SECS, AssertionClaims, AssertionSigner, SignedAssertion, TOKEN_URI,
    parse_private_key,
};
pub use credentials::ServiceAccountKey;
pub use error::ClientError;
pub use exchange::{DEFAULT_TIMEOUT, JWT_BEARER_GRANT, TokenExchanger};

/// An ID token for the `Authorization` header.
pub struct BearerToken {
    value: SecretString,
}

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: SecretString::new(value.into().into()),
        }
    }

    /// The raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// The header line passed to the HTTP client: `Authorization: Bearer <token>`.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Authorization: Bearer {}", self.expose())
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([REDACTED])")
    }
}

/// Source of bearer tokens for a protected app.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Mints a token for `audience_id` using the credential file at `credential_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential file can't be read or used, or the
    /// token endpoint doesn't return an ID token.
    async fn fetch_token(
        &self,
        credential_path: &Path,
        audience_id: &str,
    ) -> Result<BearerToken, ClientError>;
}

/// Signs an assertion from a service account file and exchanges it.
#[derive(Debug, Clone)]
pub struct IapTokenProvider {
    exchanger: TokenExchanger,
}

impl IapTokenProvider {
    /// Creates a provider whose exchange request times out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            exchanger: TokenExchanger::new(timeout)?,
        })
    }

    /// Set a custom token endpoint, used for both `aud` and the exchange.
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.exchanger = self.exchanger.with_token_uri(token_uri);
        self
    }

    #[must_use]
    pub const fn exchanger(&self) -> &TokenExchanger {
        &self.exchanger
    }
}

#[async_trait]
impl TokenProvider for IapTokenProvider {
    async fn fetch_token(
        &self,
        credential_path: &Path,
        audience_id: &str,
    ) -> Result<BearerToken, ClientError> {
        let assertion = AssertionSigner::from_file(credential_path)?
            .with_token_uri(self.exchanger.token_uri())
            .sign(audience_id)?;
        self.exchanger.exchange(assertion).await
    }
}
