//! Resolution of the credential set used for one invocation.
//!
//! Every slot is resolved independently, highest precedence first:
//!
//! 1. The environment override for the slot
//! 2. The value in the profile matched for the request host
//! 3. `curl`, for the client binary slot only
//!
//! Empty values are skipped. Overrides are captured once into [`Overrides`]
//! so resolution itself never reads the process environment. A set override
//! that isn't valid UTF-8 is an error rather than being skipped.

use std::env::VarError;
use std::path::PathBuf;

use log::debug;

use crate::error::ResolveError;
use crate::paths::expand_home;
use crate::profile::ProfileEnv;
use crate::store::CredentialStore;

/// Overrides the credential file path.
pub const ENV_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Overrides the audience (OAuth client) ID.
pub const ENV_CLIENT_ID: &str = "IAP_CLIENT_ID";

/// Overrides the HTTP client binary.
pub const ENV_CLIENT_BINARY: &str = "IAP_CURL_BIN";

/// Client binary used when nothing else names one.
pub const DEFAULT_CLIENT_BINARY: &str = "curl";

/// The three independently resolved values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    CredentialPath,
    AudienceId,
    ClientBinary,
}

impl Slot {
    /// Environment variable that overrides this slot.
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::CredentialPath => ENV_CREDENTIALS,
            Self::AudienceId => ENV_CLIENT_ID,
            Self::ClientBinary => ENV_CLIENT_BINARY,
        }
    }

    const fn fallback(self) -> Option<&'static str> {
        match self {
            Self::ClientBinary => Some(DEFAULT_CLIENT_BINARY),
            Self::CredentialPath | Self::AudienceId => None,
        }
    }

    fn profile_value(self, env: &ProfileEnv) -> &str {
        match self {
            Self::CredentialPath => &env.credential_path,
            Self::AudienceId => &env.audience_id,
            Self::ClientBinary => &env.client_binary,
        }
    }
}

/// Process-level overrides, one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub credential_path: Option<String>,
    pub audience_id: Option<String>,
    pub client_binary: Option<String>,
}

impl Overrides {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NonUnicodeOverride`] if a variable is set to a
    /// value that isn't valid UTF-8.
    pub fn from_env() -> Result<Self, ResolveError> {
        Self::try_from_lookup(|name| std::env::var(name))
    }

    /// Builds overrides from a lookup with the semantics of [`std::env::var`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NonUnicodeOverride`] for a
    /// [`VarError::NotUnicode`] value.
    pub fn try_from_lookup<F>(lookup: F) -> Result<Self, ResolveError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let read = |name: &str| match lookup(name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => {
                Err(ResolveError::NonUnicodeOverride(name.to_string()))
            }
        };

        Ok(Self {
            credential_path: read(ENV_CREDENTIALS)?,
            audience_id: read(ENV_CLIENT_ID)?,
            client_binary: read(ENV_CLIENT_BINARY)?,
        })
    }

    /// Builds overrides from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            credential_path: lookup(ENV_CREDENTIALS),
            audience_id: lookup(ENV_CLIENT_ID),
            client_binary: lookup(ENV_CLIENT_BINARY),
        }
    }

    /// The override for `slot`, if set to a non-empty value.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&str> {
        let value = match slot {
            Slot::CredentialPath => self.credential_path.as_deref(),
            Slot::AudienceId => self.audience_id.as_deref(),
            Slot::ClientBinary => self.client_binary.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Fully resolved values for one invocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    /// Credential file path, with a leading `~` expanded
    pub credential_path: PathBuf,
    pub audience_id: String,
    pub client_binary: String,
}

/// Merges [`Overrides`] with a matched profile.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    overrides: Overrides,
    home_dir: Option<PathBuf>,
}

impl EnvironmentResolver {
    /// Creates a resolver expanding `~` against the current user's home.
    #[must_use]
    pub fn new(overrides: Overrides) -> Self {
        Self {
            overrides,
            home_dir: dirs::home_dir(),
        }
    }

    /// Uses `home_dir` for `~` expansion instead of the current user's home.
    #[must_use]
    pub fn with_home_dir(mut self, home_dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(home_dir.into());
        self
    }

    #[must_use]
    pub const fn overrides(&self) -> &Overrides {
        &self.overrides
    }

    /// Resolves one slot; `None` only for slots without a fallback.
    #[must_use]
    pub fn resolve_slot(&self, slot: Slot, profile: Option<&ProfileEnv>) -> Option<String> {
        if let Some(value) = self.overrides.get(slot) {
            debug!("{}: using environment override", slot.env_var());
            return Some(value.to_string());
        }
        if let Some(value) = profile.map(|env| slot.profile_value(env)).filter(|v| !v.is_empty()) {
            debug!("{}: using config file value", slot.env_var());
            return Some(value.to_string());
        }
        slot.fallback().map(|value| {
            debug!("{}: using default {value}", slot.env_var());
            value.to_string()
        })
    }

    /// Resolves all slots against `profile` (the store match, if any).
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingCredential`] when no credential path is
    /// found, then [`ResolveError::MissingClientId`] when no audience ID is.
    pub fn resolve(&self, profile: Option<&ProfileEnv>) -> Result<ResolvedCredentials, ResolveError> {
        let credential_path = self
            .resolve_slot(Slot::CredentialPath, profile)
            .ok_or(ResolveError::MissingCredential)?;
        let audience_id = self
            .resolve_slot(Slot::AudienceId, profile)
            .ok_or(ResolveError::MissingClientId)?;
        let client_binary = self
            .resolve_slot(Slot::ClientBinary, profile)
            .unwrap_or_else(|| DEFAULT_CLIENT_BINARY.to_string());

        Ok(ResolvedCredentials {
            credential_path: expand_home(&credential_path, self.home_dir.as_deref()),
            audience_id,
            client_binary,
        })
    }

    /// Looks `url` up in `store` and resolves against the match.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve).
    pub fn resolve_for(
        &self,
        store: &CredentialStore,
        url: &str,
    ) -> Result<ResolvedCredentials, ResolveError> {
        self.resolve(store.lookup(url).map(|p| &p.env))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::HashMap;

    use super::*;
    use crate::profile::CredentialProfile;

    fn overrides(vars: &[(&str, &str)]) -> Overrides {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Overrides::from_lookup(|name| vars.get(name).cloned())
    }

    fn stored(path: &str, audience: &str, binary: &str) -> ProfileEnv {
        ProfileEnv {
            credential_path: path.to_string(),
            audience_id: audience.to_string(),
            client_binary: binary.to_string(),
        }
    }

    fn resolver(vars: &[(&str, &str)]) -> EnvironmentResolver {
        EnvironmentResolver::new(overrides(vars)).with_home_dir("/home/alice")
    }

    #[test]
    fn test_profile_values_used_without_overrides() {
        let profile = stored("/keys/sa.json", "X", "http");
        let resolved = resolver(&[]).resolve(Some(&profile)).unwrap();

        assert_eq!(resolved.credential_path, PathBuf::from("/keys/sa.json"));
        assert_eq!(resolved.audience_id, "X");
        assert_eq!(resolved.client_binary, "http");
    }

    #[test]
    fn test_override_beats_profile_per_slot() {
        let profile = stored("/keys/sa.json", "X", "http");

        let resolved = resolver(&[(ENV_CREDENTIALS, "/tmp/alt.json")])
            .resolve(Some(&profile))
            .unwrap();
        assert_eq!(resolved.credential_path, PathBuf::from("/tmp/alt.json"));
        assert_eq!(resolved.audience_id, "X");
        assert_eq!(resolved.client_binary, "http");

        let resolved = resolver(&[(ENV_CLIENT_ID, "OTHER"), (ENV_CLIENT_BINARY, "xh")])
            .resolve(Some(&profile))
            .unwrap();
        assert_eq!(resolved.credential_path, PathBuf::from("/keys/sa.json"));
        assert_eq!(resolved.audience_id, "OTHER");
        assert_eq!(resolved.client_binary, "xh");
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let profile = stored("/keys/sa.json", "X", "");
        let resolved = resolver(&[(ENV_CREDENTIALS, ""), (ENV_CLIENT_ID, "")])
            .resolve(Some(&profile))
            .unwrap();

        assert_eq!(resolved.credential_path, PathBuf::from("/keys/sa.json"));
        assert_eq!(resolved.audience_id, "X");
    }

    #[test]
    fn test_client_binary_falls_back_to_curl() {
        let resolved = resolver(&[(ENV_CREDENTIALS, "/k.json"), (ENV_CLIENT_ID, "X")])
            .resolve(None)
            .unwrap();
        assert_eq!(resolved.client_binary, DEFAULT_CLIENT_BINARY);

        let profile = stored("/k.json", "X", "");
        let resolved = resolver(&[]).resolve(Some(&profile)).unwrap();
        assert_eq!(resolved.client_binary, "curl");
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            resolver(&[]).resolve(None).unwrap_err(),
            ResolveError::MissingCredential
        );

        // Checked before the audience ID
        let profile = stored("", "", "curl");
        assert_eq!(
            resolver(&[]).resolve(Some(&profile)).unwrap_err(),
            ResolveError::MissingCredential
        );
    }

    #[test]
    fn test_missing_client_id() {
        let err = resolver(&[(ENV_CREDENTIALS, "/k.json")])
            .resolve(None)
            .unwrap_err();
        assert_eq!(err, ResolveError::MissingClientId);
        assert_eq!(err.to_string(), "IAP_CLIENT_ID is missing");

        let profile = stored("/k.json", "", "");
        assert_eq!(
            resolver(&[]).resolve(Some(&profile)).unwrap_err(),
            ResolveError::MissingClientId
        );
    }

    #[test]
    fn test_home_expansion_applies_to_any_layer() {
        let profile = stored("~/keys/sa.json", "X", "");
        let resolved = resolver(&[]).resolve(Some(&profile)).unwrap();
        assert_eq!(resolved.credential_path, PathBuf::from("/home/alice/keys/sa.json"));

        let resolved = resolver(&[(ENV_CREDENTIALS, "~/env.json")])
            .resolve(Some(&profile))
            .unwrap();
        assert_eq!(resolved.credential_path, PathBuf::from("/home/alice/env.json"));
    }

    #[test]
    fn test_resolve_for_store() {
        let store = CredentialStore::with_profiles(
            "/nonexistent/config.json",
            vec![CredentialProfile::new(
                "https://api.example.com",
                stored("/keys/api.json", "X", ""),
            )],
        );

        let resolved = resolver(&[])
            .resolve_for(&store, "https://api.example.com/v1/x")
            .unwrap();
        assert_eq!(resolved.audience_id, "X");
        assert_eq!(resolved.client_binary, "curl");

        assert_eq!(
            resolver(&[])
                .resolve_for(&store, "https://unknown.example.com")
                .unwrap_err(),
            ResolveError::MissingCredential
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_override_is_an_error() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let result = Overrides::try_from_lookup(|name| match name {
            ENV_CREDENTIALS => Err(VarError::NotUnicode(OsString::from_vec(
                b"/tmp/alt-\xff.json".to_vec(),
            ))),
            ENV_CLIENT_ID => Ok("X".to_string()),
            _ => Err(VarError::NotPresent),
        });

        let err = result.unwrap_err();
        assert_eq!(
            err,
            ResolveError::NonUnicodeOverride(ENV_CREDENTIALS.to_string())
        );
        assert_eq!(
            err.to_string(),
            "GOOGLE_APPLICATION_CREDENTIALS is set but is not valid UTF-8"
        );
    }

    #[test]
    fn test_try_from_lookup_unset_and_set() {
        let o = Overrides::try_from_lookup(|name| match name {
            ENV_CLIENT_ID => Ok("X".to_string()),
            _ => Err(VarError::NotPresent),
        })
        .unwrap();

        assert_eq!(o.get(Slot::AudienceId), Some("X"));
        assert_eq!(o.get(Slot::CredentialPath), None);
        assert_eq!(o.get(Slot::ClientBinary), None);
    }

    #[test]
    fn test_overrides_from_lookup() {
        let o = overrides(&[(ENV_CLIENT_BINARY, "wget")]);
        assert_eq!(o.get(Slot::ClientBinary), Some("wget"));
        assert_eq!(o.get(Slot::CredentialPath), None);
        assert_eq!(Slot::AudienceId.env_var(), "IAP_CLIENT_ID");
    }
}
