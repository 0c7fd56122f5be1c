//! Terminal output helpers.
//!
//! Everything here writes to stderr so the client's stdout stays clean.

use colored::Colorize;

/// Paints a client stderr line red from its first `>` onwards.
///
/// Verbose curl output marks request lines with `> `.
pub fn paint_request_line(line: &str) -> String {
    match line.find('>') {
        Some(idx) => {
            let (head, tail) = line.split_at(idx);
            format!("{head}{}", tail.red())
        }
        None => line.to_string(),
    }
}

/// Prints an error with its cause chain.
pub fn display_error(err: &anyhow::Error) {
    eprintln!("{} {err:#}", "Error:".bright_red());
}

/// Explains a failed resolution for a host that isn't in the config file.
pub fn display_unknown_host(host: &str, suggestions: &[String], config_path: &str) {
    eprintln!(
        "{} {} is not registered in {config_path}",
        "○".bright_yellow(),
        host.bright_cyan()
    );
    if !suggestions.is_empty() {
        eprintln!("  Did you mean:");
        for suggestion in suggestions {
            eprintln!("    {}", suggestion.bright_green());
        }
    }
    eprintln!("  Run `iap_curl --edit` to add it, or set the environment variables.");
}
