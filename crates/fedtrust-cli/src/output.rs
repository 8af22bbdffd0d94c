//! Output formatting utilities.

use colored::Colorize;

/// Prints a success message.
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// Prints a value as pretty JSON on standard output.
pub fn output_json<T: serde::Serialize>(value: &T) -> crate::CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
