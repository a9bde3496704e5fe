//! Multi-folder run driving.
//!
//! A single traversal is strictly sequential; parallelism lives here, one
//! level up. The runner dedicates a thread to each top-level folder, each
//! traversal owning its own summary, and merges the results afterward. The
//! only state shared across traversals is the cancellation flag. Unit-done
//! progress events flow over a channel to the caller, which owns the
//! percentage math against the pre-computed total.

use crate::config::RuleSet;
use crate::duplicate::DuplicateDecider;
use crate::engine::{ChannelProgress, Organizer, Outcome, RunState, Summary};
use crate::metadata::MetadataReader;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::warn;
use walkdir::WalkDir;

/// Options shared by every traversal in a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub recursive: bool,
    pub preview: bool,
}

/// Counts the files one traversal of `folder` would consider.
///
/// Counting failures are tolerated: an unreadable folder counts as zero and
/// the run itself will surface the real condition.
pub fn count_files(folder: &Path, recursive: bool) -> u64 {
    if recursive {
        WalkDir::new(folder)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .count() as u64
    } else {
        match fs::read_dir(folder) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .filter(|entry| entry.path().is_file())
                .count() as u64,
            Err(e) => {
                warn!(folder = %folder.display(), "Could not count files: {}", e);
                0
            }
        }
    }
}

/// Drives independent traversals over a set of folders.
pub struct Runner<'a> {
    rules: &'a RuleSet,
    reader: &'a (dyn MetadataReader + Sync),
    decider: &'a (dyn DuplicateDecider + Sync),
    options: RunOptions,
    run_state: RunState,
}

impl<'a> Runner<'a> {
    pub fn new(
        rules: &'a RuleSet,
        reader: &'a (dyn MetadataReader + Sync),
        decider: &'a (dyn DuplicateDecider + Sync),
    ) -> Self {
        Self {
            rules,
            reader,
            decider,
            options: RunOptions::default(),
            run_state: RunState::new(),
        }
    }

    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Shares an externally owned cancellation flag with every traversal.
    pub fn with_run_state(mut self, run_state: RunState) -> Self {
        self.run_state = run_state;
        self
    }

    /// A handle on the run's cancellation flag, for external cancellers.
    pub fn run_state(&self) -> RunState {
        self.run_state.clone()
    }

    /// Total file count across all folders, for progress percentages.
    pub fn count_total(&self, folders: &[PathBuf]) -> u64 {
        folders
            .iter()
            .map(|folder| count_files(folder, self.options.recursive))
            .sum()
    }

    /// Runs one traversal per folder, each on its own thread, and merges the
    /// per-folder summaries.
    ///
    /// `on_unit_done` is invoked on the calling thread once per processed
    /// file, across all folders, as events arrive.
    pub fn run(&self, folders: &[PathBuf], mut on_unit_done: impl FnMut()) -> Summary {
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            let handles: Vec<_> = folders
                .iter()
                .map(|folder| {
                    let tx = tx.clone();
                    scope.spawn(move || {
                        let sink = ChannelProgress::new(tx);
                        Organizer::new(self.rules, self.reader, self.decider)
                            .recursive(self.options.recursive)
                            .preview(self.options.preview)
                            .with_run_state(self.run_state.clone())
                            .with_progress(&sink)
                            .organize(folder)
                    })
                })
                .collect();

            // The channel closes once every traversal has finished.
            drop(tx);
            for _event in rx.iter() {
                on_unit_done();
            }

            let mut summary = Summary::new();
            for handle in handles {
                match handle.join() {
                    Ok(folder_summary) => summary.merge(folder_summary),
                    Err(_) => {
                        warn!("Traversal thread panicked");
                        summary.record(Outcome::Error);
                    }
                }
            }
            summary
        })
    }
}
