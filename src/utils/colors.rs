// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! Terminal color utilities
//!
//! Consistent markers for CLI reports.

use colored::Colorize;

/// Style for file names and commands
pub fn code(msg: &str) -> colored::ColoredString {
    msg.cyan()
}

/// Turn colors off when NO_COLOR is set or output is not for a terminal
pub fn configure_colors() {
    if std::env::var_os("NO_COLOR").is_some() || std::env::var_os("TERM").is_none() {
        colored::control::set_override(false);
    }
}

/// Print a styled section title
pub fn print_section(title: &str) {
    println!();
    println!("{}:", title.bold());
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an info item
pub fn print_info(msg: &str) {
    println!("  {} {}", "→".blue(), msg);
}
