//! Output formatting utilities for the CLI.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable result. Text output is left to the caller.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet || format != OutputFormat::Json {
        return;
    }
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

/// Print a success message.
pub fn success(msg: &str, format: OutputFormat, quiet: bool) {
    if quiet || format != OutputFormat::Text {
        return;
    }
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an aligned `label: value` line.
pub fn field(label: &str, value: impl std::fmt::Display, format: OutputFormat, quiet: bool) {
    if quiet || format != OutputFormat::Text {
        return;
    }
    println!("  {:<20} {}", format!("{}:", label).bold(), value);
}

/// Print a section heading.
pub fn heading(title: &str, format: OutputFormat, quiet: bool) {
    if quiet || format != OutputFormat::Text {
        return;
    }
    println!("{}", title.cyan().bold());
}

/// Print a warning message.
pub fn warning(msg: &str, format: OutputFormat, quiet: bool) {
    if quiet || format != OutputFormat::Text {
        return;
    }
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an error. Errors are shown even in quiet mode.
pub fn error(msg: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => eprintln!("{} {}", "error:".red().bold(), msg),
        OutputFormat::Json => {
            let body = serde_json::json!({ "error": msg });
            eprintln!("{}", body);
        }
    }
}
