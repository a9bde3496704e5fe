//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored
//! output, progress tracking, and the outcome summary table. The engine
//! itself never prints; everything user-visible goes through here.

use crate::engine::Summary;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a preview-mode notice message.
    pub fn preview_notice(message: &str) {
        println!("{}", format!("[PREVIEW] {}", message).yellow());
    }

    /// Creates and returns a progress bar for file operations.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints the outcome summary table for a completed run.
    pub fn summary_table(summary: &Summary) {
        Self::header("SUMMARY");

        if summary.is_empty() {
            println!("No files were processed.");
            return;
        }

        let rows: Vec<(&'static str, u64)> = summary.iter().collect();

        let max_key_len = rows
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or(0)
            .max(7); // At least "Outcome" width

        println!(
            "{:<width$} | {}",
            "Outcome".bold(),
            "Files".bold(),
            width = max_key_len
        );
        println!("{}", "-".repeat(max_key_len + 10));

        for (key, count) in &rows {
            println!(
                "{:<width$} | {}",
                key,
                count.to_string().green(),
                width = max_key_len
            );
        }

        println!("{}", "-".repeat(max_key_len + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            summary.total().to_string().green().bold(),
            width = max_key_len
        );
    }
}
