//! iap_curl - curl for apps behind Identity-Aware Proxy
//!
//! Resolves credentials for the target host, mints an ID token for the
//! protected app and runs the HTTP client with an `Authorization` header.
//!
//! ```text
//! iap_curl [--list | --edit | --register URL] [CLIENT ARGS...] URL [CLIENT ARGS...]
//! ```
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use log::debug;

use iap_curl_client::{IapTokenProvider, TOKEN_URI, TokenProvider};
use iap_curl_common::{
    CredentialProfile, CredentialStore, EnvironmentResolver, Overrides, ProfileEnv, host_of,
};

mod dispatch;
mod display;
mod editor;
mod invocation;

use dispatch::Dispatcher;
use invocation::Invocation;

#[derive(Parser, Debug)]
#[command(name = "iap_curl", author, version, about, long_about = None)]
struct Args {
    /// List the URLs in the config file
    #[arg(long, visible_alias = "list-urls")]
    list: bool,

    /// Open the config file in $EDITOR, creating it if needed
    #[arg(long, visible_alias = "edit-config")]
    edit: bool,

    /// Store URL in the config file with the values from the environment
    #[arg(long, value_name = "URL")]
    register: Option<String>,

    /// Path to the config file (default: ~/.config/iap_curl/config.json)
    ///
    /// Named apart from curl's own `--config`, which is passed through.
    #[arg(long, env = "IAP_CURL_CONFIG", value_name = "PATH")]
    iap_config: Option<PathBuf>,

    /// Timeout for the token exchange request
    #[arg(long, env = "IAP_CURL_TOKEN_TIMEOUT", value_name = "SECONDS", default_value_t = 30)]
    token_timeout: u64,

    /// OAuth token endpoint
    #[arg(long, env = "IAP_CURL_TOKEN_URI", default_value = TOKEN_URI, hide = true)]
    token_uri: String,

    /// Arguments for the HTTP client, including the target URL
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            display::display_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<i32> {
    let config_path = match args.iap_config {
        Some(path) => path,
        None => CredentialStore::default_path()?,
    };
    debug!("Using config file {}", config_path.display());

    if args.edit {
        editor::edit_config(&config_path)?;
        return Ok(0);
    }

    let mut store = CredentialStore::open(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    if args.list {
        for url in store.urls() {
            println!("{url}");
        }
        return Ok(0);
    }

    let resolver = EnvironmentResolver::new(Overrides::from_env()?);

    if let Some(url) = args.register {
        register(&mut store, &resolver, url)?;
        return Ok(0);
    }

    let invocation = Invocation::from_args(args.args)?;
    let profile = store.lookup(&invocation.url);
    let resolved = match resolver.resolve(profile.map(|p| &p.env)) {
        Ok(resolved) => resolved,
        Err(e) => {
            if profile.is_none() {
                let host = host_of(&invocation.url).unwrap_or_default();
                display::display_unknown_host(
                    &host,
                    &store.suggest_similar(&invocation.url),
                    &config_path.display().to_string(),
                );
            }
            return Err(e.into());
        }
    };

    let provider = IapTokenProvider::new(Duration::from_secs(args.token_timeout))?
        .with_token_uri(args.token_uri);
    let token = provider
        .fetch_token(&resolved.credential_path, &resolved.audience_id)
        .await?;

    let dispatcher = Dispatcher::new(resolved.client_binary);
    debug!("Dispatching {} to {}", invocation.url, dispatcher.binary());
    dispatcher
        .dispatch(&token, &invocation.passthrough, &invocation.url)
        .await
}

/// Adds a profile for `url` built from the environment overrides.
fn register(store: &mut CredentialStore, resolver: &EnvironmentResolver, url: String) -> Result<()> {
    // Validates that both required values are present
    let resolved = resolver.resolve(None)?;
    let env = ProfileEnv {
        credential_path: resolved.credential_path.display().to_string(),
        audience_id: resolved.audience_id,
        client_binary: resolver.overrides().client_binary.clone().unwrap_or_default(),
    };

    store.register(CredentialProfile::new(url.clone(), env))?;
    eprintln!(
        "{} Registered {} in {}",
        "✓".bright_green(),
        url.bright_cyan(),
        store.path().display()
    );
    Ok(())
}
