//! The traversal engine.
//!
//! Walks a directory, drives classification → duplicate resolution → move
//! (or preview) for each file, and accumulates a per-outcome summary. A
//! single traversal is sequential and synchronous: one file is fully
//! processed before the next begins. Per-file failures are converted into
//! named counters and never abort the run; only the fatal-to-run conditions
//! (folder missing, not a directory, listing failure) return early, as a
//! distinguished single-key summary.
//!
//! Cancellation is cooperative: the shared [`RunState`] flag is checked at
//! the start of each file-entry iteration and before each subdirectory
//! descent, never mid-file. Progress is an opaque unit-done notification
//! after every per-file outcome.

use crate::classify;
use crate::config::RuleSet;
use crate::duplicate::{self, DuplicateDecider, Resolution};
use crate::metadata::{self, MetadataReader};
use crate::mover;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use tracing::{error, info, warn};

/// What happened to one processed file, or to the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    /// File relocated to its destination.
    Moved,
    /// File would have been relocated (preview mode).
    Preview,
    /// Content-identical duplicate left in place.
    DuplicateKept,
    /// A colliding file could not be hashed; the file was skipped.
    DuplicateCheckFailed,
    /// File has no extension and was skipped.
    NoExtension,
    /// Destination directory could not be created.
    MkdirFailed,
    /// Relocation failed.
    MoveFailed,
    /// Any other per-file failure.
    ProcessingError,
    /// Fatal: the folder listing was denied.
    PermissionDenied,
    /// Fatal: folder missing, not a directory, or unlistable.
    Error,
}

impl Outcome {
    /// The stable counter key for this outcome.
    pub fn key(self) -> &'static str {
        match self {
            Outcome::Moved => "moved",
            Outcome::Preview => "preview",
            Outcome::DuplicateKept => "duplicate_kept",
            Outcome::DuplicateCheckFailed => "duplicate_check_failed",
            Outcome::NoExtension => "no_extension",
            Outcome::MkdirFailed => "mkdir_failed",
            Outcome::MoveFailed => "move_failed",
            Outcome::ProcessingError => "processing_error",
            Outcome::PermissionDenied => "permission_denied",
            Outcome::Error => "error",
        }
    }

    /// Whether this outcome kind represents a failure a user should review.
    pub fn is_issue(self) -> bool {
        matches!(
            self,
            Outcome::DuplicateCheckFailed
                | Outcome::MkdirFailed
                | Outcome::MoveFailed
                | Outcome::ProcessingError
                | Outcome::PermissionDenied
                | Outcome::Error
        )
    }
}

/// Outcome-kind → count, accumulated across an entire run.
///
/// Owned exclusively by the traversal invocation that created it; child
/// summaries from recursive descents are merged in by key-wise addition.
/// This is the sole error-reporting channel for file-level problems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    counts: BTreeMap<Outcome, u64>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A distinguished single-key summary for fatal-to-run conditions.
    fn single(outcome: Outcome) -> Self {
        let mut summary = Self::new();
        summary.record(outcome);
        summary
    }

    /// Increments the counter for `outcome`.
    pub fn record(&mut self, outcome: Outcome) {
        *self.counts.entry(outcome).or_insert(0) += 1;
    }

    /// Key-wise addition of `other` into `self`.
    pub fn merge(&mut self, other: Summary) {
        for (outcome, count) in other.counts {
            *self.counts.entry(outcome).or_insert(0) += count;
        }
    }

    /// The count recorded for one outcome kind.
    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Total count across all outcome kinds.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Total count across failure kinds only.
    pub fn issues(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(outcome, _)| outcome.is_issue())
            .map(|(_, count)| count)
            .sum()
    }

    /// True for the distinguished single-key form returned when a run could
    /// not start at all (`error` / `permission_denied`).
    pub fn is_fatal(&self) -> bool {
        self.counts.len() == 1
            && (self.count(Outcome::Error) > 0 || self.count(Outcome::PermissionDenied) > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates `(key, count)` pairs in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().map(|(outcome, count)| (outcome.key(), *count))
    }
}

/// Cooperative cancellation flag shared between a caller and an in-progress
/// traversal.
///
/// The flag only ever transitions false → true. The engine reads it at
/// file-entry and subdirectory checkpoints and never writes it.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    cancelled: Arc<AtomicBool>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Enumeration stops at the next checkpoint and
    /// the partial summary accumulated so far is returned.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Receives one opaque "unit done" signal per processed file.
///
/// The collaborator is owned by the caller, which is responsible for turning
/// unit counts into a percentage against a separately computed total. A
/// failing sink is logged and never aborts file processing.
pub trait ProgressSink {
    fn file_processed(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// One unit-done progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitDone;

/// Progress sink that forwards unit-done events onto an mpsc channel.
///
/// A disconnected receiver is ignored: nobody listening is not a failure.
pub struct ChannelProgress {
    tx: mpsc::Sender<UnitDone>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::Sender<UnitDone>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgress {
    fn file_processed(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let _ = self.tx.send(UnitDone);
        Ok(())
    }
}

/// A configured traversal over one directory tree.
///
/// Holds only borrowed collaborators; the rule table, metadata backends and
/// duplicate decider are shared read-only across any number of runs.
pub struct Organizer<'a> {
    rules: &'a RuleSet,
    reader: &'a dyn MetadataReader,
    decider: &'a dyn DuplicateDecider,
    progress: Option<&'a dyn ProgressSink>,
    run_state: RunState,
    recursive: bool,
    preview: bool,
}

impl<'a> Organizer<'a> {
    pub fn new(
        rules: &'a RuleSet,
        reader: &'a dyn MetadataReader,
        decider: &'a dyn DuplicateDecider,
    ) -> Self {
        Self {
            rules,
            reader,
            decider,
            progress: None,
            run_state: RunState::new(),
            recursive: false,
            preview: false,
        }
    }

    /// Also process subdirectories, re-listing each level independently.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Compute destinations without mutating the filesystem.
    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Attach a progress collaborator.
    pub fn with_progress(mut self, sink: &'a dyn ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Share an externally owned cancellation flag.
    pub fn with_run_state(mut self, run_state: RunState) -> Self {
        self.run_state = run_state;
        self
    }

    /// Organizes the files in `folder` and returns the outcome summary.
    ///
    /// Never panics and never returns an error value: fatal-to-run
    /// conditions yield a distinguished single-key summary, everything else
    /// is a per-file counter. Callers inspect the summary rather than expect
    /// failures to propagate.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use metasort::config::RuleSet;
    /// use metasort::duplicate::DefaultPolicy;
    /// use metasort::engine::{Organizer, Outcome};
    /// use metasort::metadata::SystemMetadata;
    /// use std::path::Path;
    ///
    /// let rules = RuleSet::default();
    /// let reader = SystemMetadata::new();
    /// let summary = Organizer::new(&rules, &reader, &DefaultPolicy)
    ///     .recursive(true)
    ///     .organize(Path::new("/home/user/Downloads"));
    /// println!("moved {} files", summary.count(Outcome::Moved));
    /// ```
    pub fn organize(&self, folder: &Path) -> Summary {
        if !folder.exists() {
            error!(folder = %folder.display(), "Folder does not exist");
            return Summary::single(Outcome::Error);
        }
        if !folder.is_dir() {
            error!(folder = %folder.display(), "Path is not a directory");
            return Summary::single(Outcome::Error);
        }

        // Snapshot the listing before processing: moves create destination
        // directories inside `folder`, and those must not show up as entries
        // of the very iteration that created them.
        let entries: Vec<io::Result<fs::DirEntry>> = match fs::read_dir(folder) {
            Ok(entries) => entries.collect(),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                error!(folder = %folder.display(), "Permission denied listing folder");
                return Summary::single(Outcome::PermissionDenied);
            }
            Err(e) => {
                error!(folder = %folder.display(), "Error listing folder: {}", e);
                return Summary::single(Outcome::Error);
            }
        };

        let mut summary = Summary::new();

        for entry in entries {
            if self.run_state.is_cancelled() {
                info!(folder = %folder.display(), "Cancelled; returning partial summary");
                break;
            }

            let src = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!(folder = %folder.display(), "Unreadable directory entry: {}", e);
                    summary.record(Outcome::ProcessingError);
                    self.notify_progress();
                    continue;
                }
            };

            if src.is_dir() {
                if self.recursive {
                    if self.run_state.is_cancelled() {
                        break;
                    }
                    summary.merge(self.organize(&src));
                }
                continue;
            }

            // Non-file, non-directory entries (e.g. broken symlinks) are
            // skipped silently.
            if !src.is_file() {
                continue;
            }

            if !self.rules.should_include(&src) {
                continue;
            }

            let outcome = self.process_file(folder, &src);
            summary.record(outcome);
            self.notify_progress();
        }

        summary
    }

    /// Runs one file through classify → ensure dir → duplicate resolution →
    /// move/preview, and converts every failure into its outcome kind.
    fn process_file(&self, folder: &Path, src: &Path) -> Outcome {
        let Some(file_name) = src.file_name() else {
            return Outcome::ProcessingError;
        };

        let ext = metadata::lowercase_extension(src);
        if ext.is_empty() {
            return Outcome::NoExtension;
        }

        let subfolder = classify::classify(src, &ext, self.rules, self.reader);
        let target_folder = folder.join(&subfolder);

        if !self.preview
            && let Err(e) = fs::create_dir_all(&target_folder)
        {
            error!(target = %target_folder.display(), "Could not create directory: {}", e);
            return Outcome::MkdirFailed;
        }

        let mut dest = target_folder.join(file_name);

        if dest.exists() {
            match duplicate::resolve(src, &dest, self.rules.default_action(), self.decider) {
                Ok(Resolution::Keep) => return Outcome::DuplicateKept,
                Ok(Resolution::Move(new_dest)) => dest = new_dest,
                Err(e) => {
                    warn!(src = %src.display(), "Duplicate check failed: {}", e);
                    return Outcome::DuplicateCheckFailed;
                }
            }
        }

        if self.preview {
            info!(src = %src.display(), dest = %dest.display(), "Preview: would move");
            return Outcome::Preview;
        }

        match mover::move_file(src, &dest) {
            Ok(()) => {
                info!(src = %src.display(), dest = %dest.display(), "Moved");
                Outcome::Moved
            }
            Err(e) => {
                error!(src = %src.display(), dest = %dest.display(), "Move failed: {}", e);
                Outcome::MoveFailed
            }
        }
    }

    fn notify_progress(&self) {
        if let Some(sink) = self.progress
            && let Err(e) = sink.file_processed()
        {
            warn!("Progress notification failed: {}", e);
        }
    }
}
