//! Command-line interface module for metasort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and validation
//! - Configuration loading
//! - Run orchestration and progress display
//! - Summary reporting

use crate::config::RuleConfig;
use crate::duplicate::{DefaultPolicy, DuplicateAction};
use crate::engine::Outcome;
use crate::metadata::SystemMetadata;
use crate::output::OutputFormatter;
use crate::runner::{RunOptions, Runner};
use clap::Parser;
use std::path::PathBuf;

/// Sort files into destination subfolders by file type and metadata.
#[derive(Debug, Parser)]
#[command(name = "metasort", version, about)]
pub struct Cli {
    /// Directories to organize.
    #[arg(required = true, value_name = "DIR")]
    pub directories: Vec<PathBuf>,

    /// Also process subdirectories, each level organized into itself.
    #[arg(short, long)]
    pub recursive: bool,

    /// Compute destinations without moving anything.
    #[arg(short, long)]
    pub preview: bool,

    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the configured duplicate action: k(eep), o(verwrite), r(ename).
    #[arg(long, value_name = "ACTION")]
    pub on_duplicate: Option<String>,
}

/// Runs the CLI application.
///
/// Returns `Err` only for conditions that should fail the whole invocation:
/// unusable configuration or a run that could not start at all. File-level
/// problems are reported through the summary as "completed with N issues"
/// and are not a hard failure.
pub fn run(cli: Cli) -> Result<(), String> {
    let mut config = RuleConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    if let Some(token) = &cli.on_duplicate {
        if DuplicateAction::parse_token(token).is_none() {
            return Err(format!(
                "Invalid duplicate action '{}': expected k, o or r",
                token
            ));
        }
        config.default_duplicate_action = token.clone();
    }

    let rules = config
        .compile()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    let reader = SystemMetadata::new();
    let decider = DefaultPolicy;
    let runner = Runner::new(&rules, &reader, &decider).options(RunOptions {
        recursive: cli.recursive,
        preview: cli.preview,
    });

    if cli.preview {
        OutputFormatter::preview_notice("No files will be moved.");
    }
    for directory in &cli.directories {
        OutputFormatter::info(&format!("Organizing contents of: {}", directory.display()));
    }

    let total = runner.count_total(&cli.directories);
    let bar = OutputFormatter::create_progress_bar(total);
    let summary = runner.run(&cli.directories, || bar.inc(1));
    bar.finish_and_clear();

    if summary.is_fatal() {
        if summary.count(Outcome::PermissionDenied) > 0 {
            return Err("Permission denied listing the folder".to_string());
        }
        return Err("Folder does not exist or is not a directory".to_string());
    }

    OutputFormatter::summary_table(&summary);

    let issues = summary.issues();
    if issues > 0 {
        OutputFormatter::warning(&format!(
            "Completed with {} issue{}. Review the summary above.",
            issues,
            if issues == 1 { "" } else { "s" }
        ));
    } else if cli.preview {
        OutputFormatter::success("Preview complete. No files were modified.");
    } else {
        OutputFormatter::success("Organization complete!");
    }

    Ok(())
}
