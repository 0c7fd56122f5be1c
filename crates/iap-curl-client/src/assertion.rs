//! Signed JWT-bearer assertions.
//!
//! An assertion is a compact RS256 JWS whose claims name the service account
//! (`iss`), the token endpoint (`aud`), a one hour validity window
//! (`iat`/`exp`) and the protected resource (`target_audience`). The token
//! endpoint answers it with an ID token scoped to `target_audience`.

use std::path::Path;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::debug;
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::pkcs8::der::pem::decode_label;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::credentials::ServiceAccountKey;
use crate::error::ClientError;

/// Google OAuth 2.0 token endpoint, the audience of every assertion.
pub const TOKEN_URI: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Seconds between `iat` and `exp`.
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Claim set of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service account identity
    pub iss: String,
    /// Token endpoint the assertion is meant for
    pub aud: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, always `iat + 3600`
    pub exp: i64,
    /// Audience (OAuth client) ID of the protected resource
    pub target_audience: String,
}

/// A signed assertion, ready for a single exchange.
///
/// Not `Clone`; [`TokenExchanger::exchange`](crate::TokenExchanger::exchange) consumes it.
#[derive(Debug)]
pub struct SignedAssertion {
    claims: AssertionClaims,
    encoded: SecretString,
}

impl SignedAssertion {
    /// The signed claims.
    #[must_use]
    pub const fn claims(&self) -> &AssertionClaims {
        &self.claims
    }

    /// The compact `header.claims.signature` form.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.encoded.expose_secret()
    }
}

/// Parses a PEM private key, accepting PKCS#1 and PKCS#8 RSA keys.
///
/// The key is precomputed and checked for internal consistency before use.
///
/// # Errors
///
/// Returns [`ClientError::InvalidKey`] for malformed PEM, any other PEM block
/// type, a non-RSA PKCS#8 key, or a key that fails validation.
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey, ClientError> {
    let pem = pem.trim();
    let label = decode_label(pem.as_bytes())
        .map_err(|e| ClientError::InvalidKey(format!("invalid private key data: {e}")))?;

    let mut key = match label {
        PKCS1_LABEL => RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| ClientError::InvalidKey(format!("malformed PKCS#1 RSA key: {e}")))?,
        PKCS8_LABEL => RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| {
            ClientError::InvalidKey(format!("PKCS#8 key is not a usable RSA private key: {e}"))
        })?,
        other => {
            return Err(ClientError::InvalidKey(format!(
                "invalid private key type: {other}"
            )));
        }
    };

    key.precompute()
        .map_err(|e| ClientError::InvalidKey(format!("key precomputation failed: {e}")))?;
    key.validate()
        .map_err(|e| ClientError::InvalidKey(format!("key validation failed: {e}")))?;

    Ok(key)
}

/// Builds and signs assertions for one service account.
pub struct AssertionSigner {
    encoding_key: EncodingKey,
    issuer: String,
    key_id: Option<String>,
    token_uri: String,
}

impl AssertionSigner {
    /// Creates a signer from an already validated key.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidKey`] if the key can't be re-encoded
    /// for signing.
    pub fn new(key: &RsaPrivateKey, issuer: impl Into<String>) -> Result<Self, ClientError> {
        let der = key
            .to_pkcs1_der()
            .map_err(|e| ClientError::InvalidKey(format!("key encoding failed: {e}")))?;

        Ok(Self {
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
            issuer: issuer.into(),
            key_id: None,
            token_uri: TOKEN_URI.to_string(),
        })
    }

    /// Creates a signer from a parsed service account key.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidKey`] if the private key is unusable.
    pub fn from_service_account(account: &ServiceAccountKey) -> Result<Self, ClientError> {
        let key = parse_private_key(account.private_key_pem())?;
        let mut signer = Self::new(&key, account.client_email.clone())?;
        signer.key_id.clone_from(&account.private_key_id);
        Ok(signer)
    }

    /// Reads a credential file and creates a signer from it.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CredentialRead`] if the file can't be read and
    /// [`ClientError::InvalidKey`] if its contents are unusable.
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        debug!("Reading credential file {}", path.display());
        Self::from_service_account(&ServiceAccountKey::from_file(path)?)
    }

    /// Sets the `kid` header.
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Sets the token endpoint used as the `aud` claim.
    #[must_use]
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }

    /// Service account identity used as the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs an assertion for `audience_id`, issued now.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Signing`] if encoding or signing fails.
    pub fn sign(&self, audience_id: &str) -> Result<SignedAssertion, ClientError> {
        self.sign_at(audience_id, Utc::now())
    }

    /// Signs an assertion for `audience_id` issued at `issued_at`.
    ///
    /// The output depends only on the key, the claims and `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Signing`] if encoding or signing fails.
    pub fn sign_at(
        &self,
        audience_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<SignedAssertion, ClientError> {
        let iat = issued_at.timestamp();
        let claims = AssertionClaims {
            iss: self.issuer.clone(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            target_audience: audience_id.to_string(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key_id);

        let encoded = jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| ClientError::Signing(e.to_string()))?;

        debug!(
            "Signed assertion for {} (target_audience={}, exp={})",
            claims.iss, claims.target_audience, claims.exp
        );

        Ok(SignedAssertion {
            claims,
            encoded: SecretString::new(encoded.into()),
        })
    }
}
