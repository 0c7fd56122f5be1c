//! Opening the host store in the user's editor.

use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use iap_curl_common::CredentialStore;
use log::debug;

/// Editor used when `EDITOR` is unset or blank.
pub const DEFAULT_EDITOR: &str = "vim";

/// Splits an `EDITOR` value into a program and its arguments, appending `path`.
///
/// # Errors
///
/// Returns an error if the value has unbalanced quotes.
pub fn editor_command(editor: Option<&str>, path: &Path) -> Result<(String, Vec<OsString>)> {
    let editor = editor
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_EDITOR);
    let mut words = shell_words::split(editor)
        .with_context(|| format!("Failed to parse EDITOR value `{editor}`"))?
        .into_iter();

    let Some(program) = words.next() else {
        bail!("EDITOR is empty");
    };
    let mut args: Vec<OsString> = words.map(OsString::from).collect();
    args.push(path.as_os_str().to_os_string());
    Ok((program, args))
}

/// Creates the store if needed and edits it, blocking until the editor exits.
///
/// # Errors
///
/// Returns an error if the store can't be created, the editor can't be
/// started, or it exits unsuccessfully.
pub fn edit_config(path: &Path) -> Result<()> {
    CredentialStore::create_if_missing(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let editor = std::env::var("EDITOR").ok();
    let (program, args) = editor_command(editor.as_deref(), path)?;
    debug!("Opening {} with {program}", path.display());

    let status = Command::new(&program)
        .args(&args)
        .status()
        .with_context(|| format!("Failed to start editor `{program}`"))?;

    if !status.success() {
        bail!("Editor `{program}` exited with {status}");
    }
    Ok(())
}
