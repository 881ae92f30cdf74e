//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use usage_lib::{ComponentStatus, UsageLabel};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Section heading with an underline
pub fn print_heading(title: &str, width: usize) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(width));
}

/// Accuracy as a percentage
pub fn format_accuracy(accuracy: f64) -> String {
    format!("{:.1}%", accuracy * 100.0)
}

pub fn color_accuracy(accuracy: f64) -> String {
    let formatted = format_accuracy(accuracy);
    if accuracy >= 0.8 {
        formatted.green().to_string()
    } else if accuracy >= 0.6 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

pub fn color_label(label: UsageLabel) -> String {
    match label {
        UsageLabel::Basso => label.as_str().blue().to_string(),
        UsageLabel::Medio => label.as_str().yellow().to_string(),
        UsageLabel::Alto => label.as_str().green().to_string(),
    }
}

pub fn color_status(status: ComponentStatus) -> String {
    match status {
        ComponentStatus::Healthy => "healthy".green().to_string(),
        ComponentStatus::Degraded => "degraded".yellow().to_string(),
        ComponentStatus::Unhealthy => "unhealthy".red().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_accuracy() {
        assert_eq!(format_accuracy(0.8333), "83.3%");
        assert_eq!(format_accuracy(1.0), "100.0%");
    }
}
