//! # iap-curl-common
//!
//! Shared types and local state for iap-curl.
//!
//! This crate owns everything that happens before a token is minted:
//! - Per-host credential profiles and the JSON store that keeps them
//! - The environment variables that override stored values
//! - Resolution of the final credential set for one invocation
//!
//! ## Example
//!
//! ```no_run
//! use iap_curl_common::{CredentialStore, EnvironmentResolver, Overrides};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::open(CredentialStore::default_path()?)?;
//! let resolver = EnvironmentResolver::new(Overrides::from_env()?);
//!
//! let url = "https://api.example.com/v1/items";
//! let resolved = resolver.resolve(store.lookup(url).map(|p| &p.env))?;
//! println!("audience: {}", resolved.audience_id);
//! # Ok(())
//! # }
//! ```

pub mod error;
/// XDG-style path helpers for the host store.
pub mod paths;
/// Credential profile records as they appear in the host store.
pub mod profile;
/// Precedence resolution between environment overrides and stored profiles.
pub mod resolve;
/// The JSON-backed host credential store.
pub mod store;

pub use error::{ResolveError, StoreError};
pub use profile::{CredentialProfile, ProfileEnv};
pub use resolve::{
    DEFAULT_CLIENT_BINARY, ENV_CLIENT_BINARY, ENV_CLIENT_ID, ENV_CREDENTIALS, EnvironmentResolver,
    Overrides, ResolvedCredentials, Slot,
};
pub use store::{CredentialStore, host_of};
