//! Service account credential files.
//!
//! Only the fields needed to sign an assertion are read; everything else in
//! the exported key file is ignored.

use std::fmt;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ClientError;

#[derive(Deserialize)]
struct RawServiceAccount {
    #[serde(default)]
    client_email: String,
    #[serde(default)]
    private_key: String,
    #[serde(default)]
    private_key_id: Option<String>,
}

/// A service account key as exported by the identity provider.
pub struct ServiceAccountKey {
    /// Service account identity, used as the assertion issuer
    pub client_email: String,
    /// Key ID, sent as the JWS `kid` header when present
    pub private_key_id: Option<String>,
    private_key: SecretString,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Reads and parses a credential file.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CredentialRead`] if the file can't be read and
    /// [`ClientError::InvalidKey`] if it isn't a service account document.
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ClientError::CredentialRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&contents)
    }

    /// Parses a service account JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidKey`] if the JSON is malformed or lacks
    /// `client_email` or `private_key`.
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let raw: RawServiceAccount = serde_json::from_str(json).map_err(|e| {
            ClientError::InvalidKey(format!("credential file is not a service account key: {e}"))
        })?;

        if raw.client_email.is_empty() {
            return Err(ClientError::InvalidKey(
                "credential file has no client_email".to_string(),
            ));
        }
        if raw.private_key.is_empty() {
            return Err(ClientError::InvalidKey(
                "credential file has no private_key".to_string(),
            ));
        }

        Ok(Self {
            client_email: raw.client_email,
            private_key_id: raw.private_key_id.filter(|id| !id.is_empty()),
            private_key: SecretString::new(raw.private_key.into()),
        })
    }

    /// The PEM-encoded private key.
    #[must_use]
    pub fn private_key_pem(&self) -> &str {
        self.private_key.expose_secret()
    }
}
