use serde::{Deserialize, Serialize};

use crate::store::host_of;

/// One entry of the host store: a URL and the values used for requests to its host.
///
/// Only the host (and explicit port) of `url` takes part in matching; scheme
/// and path are kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProfile {
    /// URL of the protected app, e.g. `https://api.example.com`
    pub url: String,

    /// Values for this host, keyed by the environment variable they stand in for
    #[serde(default)]
    pub env: ProfileEnv,
}

/// Stored values for a host.
///
/// Field names on disk match the environment variables that override them.
/// Empty strings are treated the same as absent fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEnv {
    /// Path to the service account credential file
    #[serde(rename = "GOOGLE_APPLICATION_CREDENTIALS", default)]
    pub credential_path: String,

    /// OAuth client ID of the protected resource (the token's target audience)
    #[serde(rename = "IAP_CLIENT_ID", default)]
    pub audience_id: String,

    /// HTTP client binary to run for this host
    #[serde(rename = "IAP_CURL_BIN", default)]
    pub client_binary: String,
}

impl CredentialProfile {
    /// Creates a profile for `url` with the given values.
    pub fn new(url: impl Into<String>, env: ProfileEnv) -> Self {
        Self {
            url: url.into(),
            env,
        }
    }

    /// The entry written to a freshly created store.
    #[must_use]
    pub fn sample() -> Self {
        Self::new(
            "https://iap-protected-app-url",
            ProfileEnv {
                credential_path: "/path/to/google-credentials.json".to_string(),
                audience_id: "foobar.apps.googleusercontent.com".to_string(),
                client_binary: "curl".to_string(),
            },
        )
    }

    /// The `host[:port]` this profile matches, if its URL parses.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        host_of(&self.url)
    }
}
