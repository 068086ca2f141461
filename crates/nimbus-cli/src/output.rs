//! Terminal output helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// Width of the label column in [`field`] output.
const LABEL_WIDTH: usize = 14;

pub fn success(msg: &str) {
    println!("{} {}", "ok".green().bold(), msg);
}

/// Report a non-fatal problem on stderr.
pub fn warning(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

/// Print `label: value` with the labels aligned.
pub fn field(label: &str, value: &str) {
    let label = format!("{}:", label);
    println!("{:<width$} {}", label.dimmed(), value, width = LABEL_WIDTH);
}

pub fn json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
