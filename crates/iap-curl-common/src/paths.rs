//! Config file locations and `~` expansion.
//!
//! Respects `XDG_CONFIG_HOME`, falling back to `~/.config`.

use std::path::{Path, PathBuf};

/// Directory name under the config base that holds the host store.
pub const APP_DIR: &str = "iap_curl";

/// File name of the host store.
pub const CONFIG_FILE: &str = "config.json";

/// Returns the XDG config base directory.
///
/// Uses `XDG_CONFIG_HOME` if set, otherwise `~/.config`. On platforms
/// without a home directory convention the OS config directory is used.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .or_else(dirs::config_dir)
}

/// Returns the default location of the host store.
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Expands a leading `~` to `home`.
///
/// Only `~` on its own or followed by a path separator is expanded;
/// `~user` forms are returned unchanged.
#[must_use]
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return PathBuf::from(path);
    };
    if path == "~" {
        return home.to_path_buf();
    }
    path.strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"))
        .map_or_else(|| PathBuf::from(path), |rest| home.join(rest))
}
