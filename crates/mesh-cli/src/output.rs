//! Output helpers shared by the commands.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a result as pretty JSON, or as debug text for the text format.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: failed to serialise output: {}", "Error".red().bold(), e),
        },
        OutputFormat::Text => {
            if let Ok(value) = serde_json::to_value(value) {
                println!("{}", value);
            }
        }
    }
}

/// Print a success line. Suppressed for JSON output.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a progress line. Suppressed for JSON output.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{}", message.dimmed());
}
