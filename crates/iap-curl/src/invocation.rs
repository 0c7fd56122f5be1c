//! Splitting the trailing command line into the target URL and client arguments.

use anyhow::{Result, bail};
use url::Url;

/// The request to forward: target URL plus the client's own arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Target URL exactly as given on the command line
    pub url: String,
    /// Remaining arguments, in order
    pub passthrough: Vec<String>,
}

/// Client options whose value is a URL other than the target.
const URL_VALUED_OPTIONS: &[&str] = &[
    "-x",
    "--proxy",
    "--preproxy",
    "-e",
    "--referer",
    "--doh-url",
];

impl Invocation {
    /// Picks the first absolute `http`/`https` URL with a host as the target.
    ///
    /// The value following a proxy, referer or DoH option is never the
    /// target, even when it is a URL.
    ///
    /// # Errors
    ///
    /// Returns an error if no argument is such a URL.
    pub fn from_args(args: Vec<String>) -> Result<Self> {
        let Some(index) = target_index(&args) else {
            bail!("invalid url or url not given");
        };

        let mut passthrough = args;
        let url = passthrough.remove(index);
        Ok(Self { url, passthrough })
    }
}

fn target_index(args: &[String]) -> Option<usize> {
    let mut skip_next = false;
    for (index, arg) in args.iter().enumerate() {
        if std::mem::take(&mut skip_next) {
            continue;
        }
        if URL_VALUED_OPTIONS.contains(&arg.as_str()) {
            skip_next = true;
        } else if is_target_url(arg) {
            return Some(index);
        }
    }
    None
}

fn is_target_url(arg: &str) -> bool {
    Url::parse(arg).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}
