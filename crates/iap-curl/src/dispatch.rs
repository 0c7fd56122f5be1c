//! Hands the request off to the HTTP client binary.
//!
//! The client runs with an argument vector, never through a shell:
//! `<binary> -H "Authorization: Bearer <token>" <passthrough...> <url>`.
//! Stdin and stdout are inherited, stderr is relayed with request lines
//! painted, and the client's exit code becomes ours.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use iap_curl_client::BearerToken;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;

use crate::display::paint_request_line;

/// Runs one HTTP client binary.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    binary: String,
}

/// Arguments for the client: the auth header, the passthrough arguments, then the URL.
pub fn client_args(token: &BearerToken, passthrough: &[String], url: &str) -> Vec<String> {
    let mut args = Vec::with_capacity(passthrough.len() + 3);
    args.push("-H".to_string());
    args.push(token.authorization_header());
    args.extend(passthrough.iter().cloned());
    args.push(url.to_string());
    args
}

impl Dispatcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Runs the client and waits for it.
    ///
    /// Returns the client's exit code; a client killed by a signal yields 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary can't be started or waited for. A
    /// failure to write the relayed stderr is only logged; the client still
    /// runs to completion and its exit code is returned.
    pub async fn dispatch(
        &self,
        token: &BearerToken,
        passthrough: &[String],
        url: &str,
    ) -> Result<i32> {
        self.dispatch_with_stderr(token, passthrough, url, &mut tokio::io::stderr())
            .await
    }

    async fn dispatch_with_stderr<W>(
        &self,
        token: &BearerToken,
        passthrough: &[String],
        url: &str,
        out: &mut W,
    ) -> Result<i32>
    where
        W: AsyncWrite + Unpin,
    {
        let args = client_args(token, passthrough, url);
        if log::log_enabled!(log::Level::Debug) {
            let mut shown = vec![self.binary.clone()];
            shown.extend(args.iter().map(|arg| {
                if arg.starts_with("Authorization: Bearer ") {
                    "Authorization: Bearer [REDACTED]".to_string()
                } else {
                    arg.clone()
                }
            }));
            debug!("Running {}", shell_words::join(&shown));
        }

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    anyhow!("{}: command not found", self.binary)
                } else {
                    anyhow!("Failed to start {}: {e}", self.binary)
                }
            })?;

        if let Some(stderr) = child.stderr.take() {
            let mut reader = BufReader::new(stderr);
            if let Err(e) = relay_stderr(&mut reader, out).await {
                warn!("Failed to relay {} stderr: {e}", self.binary);
                // Keep the pipe drained so the client can run to completion
                tokio::io::copy(&mut reader, &mut tokio::io::sink())
                    .await
                    .context("Failed to read client stderr")?;
            }
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for {}", self.binary))?;
        debug!("{} exited with {status}", self.binary);

        Ok(status.code().unwrap_or(1))
    }
}

/// Copies `reader` to `out` line by line, painting request lines.
async fn relay_stderr<R, W>(reader: &mut R, out: &mut W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        let painted = paint_request_line(text.trim_end_matches(['\n', '\r']));
        out.write_all(painted.as_bytes()).await?;
        out.write_all(b"\n").await?;
    }
    out.flush().await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::pin::Pin;
    use std::task::{Context as TaskContext, Poll};

    use super::*;

    /// Writer failing every write the way a closed stderr pipe does.
    struct ClosedPipe;

    impl AsyncWrite for ClosedPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut TaskContext<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("client.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_client_args_order() {
        let token = BearerToken::new("abc");
        let passthrough = vec!["-X".to_string(), "POST".to_string()];

        assert_eq!(
            client_args(&token, &passthrough, "https://api.example.com/v1"),
            vec![
                "-H",
                "Authorization: Bearer abc",
                "-X",
                "POST",
                "https://api.example.com/v1"
            ]
        );
    }

    #[test]
    fn test_client_args_keep_spaces_and_quotes() {
        let token = BearerToken::new("abc");
        let passthrough = vec!["-d".to_string(), "it's $(not) a shell".to_string()];

        let args = client_args(&token, &passthrough, "https://api.example.com");
        assert_eq!(args[3], "it's $(not) a shell");
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dispatcher = Dispatcher::new("iap-curl-definitely-not-installed");
        let err = dispatcher
            .dispatch(&BearerToken::new("abc"), &[], "https://api.example.com")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "iap-curl-definitely-not-installed: command not found"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_propagates() {
        let token = BearerToken::new("abc");

        let code = Dispatcher::new("true")
            .dispatch(&token, &[], "https://api.example.com")
            .await
            .unwrap();
        assert_eq!(code, 0);

        let code = Dispatcher::new("false")
            .dispatch(&token, &[], "https://api.example.com")
            .await
            .unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_relay_paints_request_lines() {
        let input = b"* Connected\r\n> GET / HTTP/1.1\n< HTTP/1.1 200 OK" as &[u8];
        let mut reader = BufReader::new(input);
        let mut out = Vec::new();

        relay_stderr(&mut reader, &mut out).await.unwrap();

        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "* Connected");
        assert!(lines[1].contains("> GET / HTTP/1.1"));
        assert_eq!(lines[2], "< HTTP/1.1 200 OK");
        assert!(out.ends_with('\n') && !out.contains('\r'));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_closed_stderr_keeps_client_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        // More stderr than a pipe buffer holds
        let script = write_script(
            dir.path(),
            "i=0; while [ $i -lt 5000 ]; do echo '> padding line for the stderr pipe' >&2; i=$((i+1)); done; exit 3",
        );

        let code = Dispatcher::new(script)
            .dispatch_with_stderr(
                &BearerToken::new("abc"),
                &[],
                "https://api.example.com",
                &mut ClosedPipe,
            )
            .await
            .unwrap();

        assert_eq!(code, 3);
    }
}
