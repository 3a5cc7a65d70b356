#![allow(dead_code)]

use colored::Colorize;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{}/{}]", num, total).blue().bold(), msg);
}

/// Print the outcome of one step, indented under its step line
pub fn step_result(ok: bool, msg: &str) {
    if ok {
        println!("  {} {}", "✓".green(), msg);
    } else {
        println!("  {} {}", "✗".red(), msg.red());
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Mark dry-run output so it is never mistaken for a real change
pub fn dry_run_prefix(dry_run: bool) -> &'static str {
    if dry_run { "[dry-run] " } else { "" }
}

/// Render a version tracker line: `name  version  (index N)`
pub fn format_tracker(name: &str, version: &str, index: u32) -> String {
    if index == 0 {
        format!("{name}: {version}")
    } else {
        format!("{name}: {version} (index {index})")
    }
}

// ============================================================================
// Tests
// ============================================================================
