//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.
//! Record data goes to stdout uncolored; diagnostics go to stderr.

use std::fmt::Display;

use colored::Colorize;

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "warning:" prefix) to stderr
pub fn warning(msg: &(impl Display + ?Sized)) {
    eprintln!("{}: {}", "warning".yellow(), msg);
}

/// Passed check line
pub fn check_ok(msg: &(impl Display + ?Sized)) {
    println!("  {} {}", "✓".green(), msg);
}

/// Failed check line
pub fn check_failed(msg: &(impl Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (dimmed)
pub fn detail(msg: &(impl Display + ?Sized)) {
    println!("  {}", msg.to_string().dimmed());
}

/// Print data (no color, no trailing newline added)
pub fn data(text: &str) {
    print!("{}", text);
}

/// Print plain line (no color)
pub fn info(msg: &(impl Display + ?Sized)) {
    println!("{}", msg);
}
