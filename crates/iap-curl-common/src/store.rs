//! Host credential store.
//!
//! The store lives at `~/.config/iap_curl/config.json` and keeps an ordered
//! list of per-host profiles.
//!
//! ## Example File
//!
//! ```json
//! {
//!   "services": [
//!     {
//!       "url": "https://iap-protected-app-url",
//!       "env": {
//!         "GOOGLE_APPLICATION_CREDENTIALS": "/path/to/google-credentials.json",
//!         "IAP_CLIENT_ID": "foobar.apps.googleusercontent.com",
//!         "IAP_CURL_BIN": "curl"
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Writes replace the whole file through a temporary sibling and a rename,
//! so a failed write leaves the previous contents in place. Concurrent
//! writers are not coordinated; the last rename wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StoreError;
use crate::paths;
use crate::profile::CredentialProfile;

type Result<T> = std::result::Result<T, StoreError>;

/// On-disk shape of the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    services: Vec<CredentialProfile>,
}

/// Ordered set of credential profiles backed by a JSON file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    document: StoreDocument,
}

/// Returns the `host[:port]` authority of `url`, or `None` if it has no host.
///
/// Hosts come out of the URL parser lower-cased, and ports equal to the
/// scheme default are dropped.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str().filter(|h| !h.is_empty())?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

impl CredentialStore {
    /// Returns the default store location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        paths::config_file().ok_or(StoreError::NoConfigDir)
    }

    /// Builds an in-memory store that will persist to `path` on registration.
    pub fn with_profiles(path: impl Into<PathBuf>, profiles: Vec<CredentialProfile>) -> Self {
        Self {
            path: path.into(),
            document: StoreDocument { services: profiles },
        }
    }

    /// Opens the store at `path`, creating it with a sample entry first if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, read, or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Self::create_if_missing(&path)?;
        Self::load(path)
    }

    /// Loads an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be read, or isn't a
    /// valid store document.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = fs::read_to_string(&path).map_err(|e| StoreError::io(&path, e))?;
        let document: StoreDocument =
            serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!(
            "Loaded {} profile(s) from {}",
            document.services.len(),
            path.display()
        );

        Ok(Self { path, document })
    }

    /// Writes a store holding the sample profile if `path` doesn't exist yet.
    ///
    /// Returns `true` if the file was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn create_if_missing(path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }

        let store = Self::with_profiles(path, vec![CredentialProfile::sample()]);
        store.persist()?;
        info!("Created config file {}", path.display());
        Ok(true)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All profiles in file order.
    #[must_use]
    pub fn profiles(&self) -> &[CredentialProfile] {
        &self.document.services
    }

    /// Stored URLs in file order.
    #[must_use]
    pub fn urls(&self) -> Vec<&str> {
        self.document
            .services
            .iter()
            .map(|s| s.url.as_str())
            .collect()
    }

    /// Finds the profile whose host equals the host of `url`.
    ///
    /// A miss (including an unparseable `url`) is `None`.
    #[must_use]
    pub fn lookup(&self, url: &str) -> Option<&CredentialProfile> {
        let Some(wanted) = host_of(url) else {
            debug!("{url}: no host to match");
            return None;
        };

        let found = self
            .document
            .services
            .iter()
            .find(|profile| profile.host().as_deref() == Some(wanted.as_str()));

        match found {
            Some(profile) => debug!("{wanted}: matched stored profile {}", profile.url),
            None => debug!("{wanted}: no such host in config file"),
        }
        found
    }

    /// Returns `true` iff [`lookup`](Self::lookup) would find a profile.
    #[must_use]
    pub fn is_registered(&self, url: &str) -> bool {
        self.lookup(url).is_some()
    }

    /// Stored hosts that look like the host of `url`.
    ///
    /// A host is suggested when it contains or is contained in the requested
    /// host, or when its edit distance is within `max(2, len / 4)`. Results
    /// are ordered by distance, then file order. Only meant for messages.
    #[must_use]
    pub fn suggest_similar(&self, url: &str) -> Vec<String> {
        let Some(wanted) = host_of(url) else {
            return Vec::new();
        };
        let threshold = (wanted.chars().count() / 4).max(2);

        let mut candidates: Vec<(usize, String)> = Vec::new();
        for host in self.document.services.iter().filter_map(CredentialProfile::host) {
            if host == wanted || candidates.iter().any(|(_, h)| *h == host) {
                continue;
            }
            let distance = levenshtein_distance(&wanted, &host);
            let related = host.contains(wanted.as_str()) || wanted.contains(host.as_str());
            if related || distance <= threshold {
                candidates.push((distance, host));
            }
        }

        candidates.sort_by_key(|(distance, _)| *distance);
        candidates.into_iter().map(|(_, host)| host).collect()
    }

    /// Appends `profile` and rewrites the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile URL has no host, the host is already
    /// registered, or the file cannot be written. On a write failure the
    /// in-memory store is left unchanged.
    pub fn register(&mut self, profile: CredentialProfile) -> Result<()> {
        let host = profile
            .host()
            .ok_or_else(|| StoreError::InvalidUrl(profile.url.clone()))?;
        if self.is_registered(&profile.url) {
            return Err(StoreError::AlreadyRegistered(host));
        }

        self.document.services.push(profile);
        if let Err(e) = self.persist() {
            self.document.services.pop();
            return Err(e);
        }

        info!("Registered {host} in {}", self.path.display());
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let mut contents = serde_json::to_vec_pretty(&self.document)?;
        contents.push(b'\n');
        write_atomically(&self.path, |file| file.write_all(&contents))
    }
}

/// Writes a file by filling a temporary sibling and renaming it over `path`.
///
/// If `fill` fails the temporary file is removed and `path` is untouched.
pub(crate) fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> std::io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    fill(tmp.as_file_mut()).map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() {
        return b.chars().count();
    }
    if b.is_empty() {
        return a.chars().count();
    }

    let b_chars = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b_chars.len()).collect::<Vec<_>>();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, left) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, right) in b_chars.iter().enumerate() {
            let substitution_cost = usize::from(left != *right);
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            let substitution = previous[j] + substitution_cost;
            current[j + 1] = deletion.min(insertion).min(substitution);
        }
        previous.clone_from_slice(&current);
    }

    previous[b_chars.len()]
}
