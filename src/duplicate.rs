//! Duplicate detection and resolution.
//!
//! Invoked only when a classified destination path already exists. Content
//! equality is confirmed by digest before any policy applies: two files with
//! unequal content must never merge under one name, so that case always
//! renames and never consults the decision collaborator. True duplicates go
//! through an injected [`DuplicateDecider`], keeping interactive prompting
//! out of the engine.

use crate::hash;
use std::path::{Path, PathBuf};

/// What to do with a confirmed duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateAction {
    /// Leave the existing destination in place and skip the source.
    Keep,
    /// Replace the destination with the source.
    Overwrite,
    /// Move the source under a collision-free `_copy{N}` name.
    Rename,
}

impl DuplicateAction {
    /// Parses a configuration token (`"k"`/`"o"`/`"r"`, or the full words).
    pub fn parse_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "k" | "keep" => Some(Self::Keep),
            "o" | "overwrite" => Some(Self::Overwrite),
            "r" | "rename" => Some(Self::Rename),
            _ => None,
        }
    }
}

/// Decides the action for a confirmed (content-identical) duplicate.
///
/// The engine never prompts; callers inject the decision policy. The
/// standard implementations are [`DefaultPolicy`] (non-interactive) and
/// [`FnDecider`] (delegate to the caller, e.g. a prompt or dialog).
pub trait DuplicateDecider {
    fn decide(&self, src: &Path, dest: &Path, default: DuplicateAction) -> DuplicateAction;
}

/// Non-interactive decider: always applies the configured default action.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl DuplicateDecider for DefaultPolicy {
    fn decide(&self, _src: &Path, _dest: &Path, default: DuplicateAction) -> DuplicateAction {
        default
    }
}

/// Decider that delegates to a caller-supplied function.
pub struct FnDecider<F>
where
    F: Fn(&Path, &Path, DuplicateAction) -> DuplicateAction,
{
    decide: F,
}

impl<F> FnDecider<F>
where
    F: Fn(&Path, &Path, DuplicateAction) -> DuplicateAction,
{
    pub fn new(decide: F) -> Self {
        Self { decide }
    }
}

impl<F> DuplicateDecider for FnDecider<F>
where
    F: Fn(&Path, &Path, DuplicateAction) -> DuplicateAction,
{
    fn decide(&self, src: &Path, dest: &Path, default: DuplicateAction) -> DuplicateAction {
        (self.decide)(src, dest, default)
    }
}

/// Errors from duplicate resolution.
#[derive(Debug)]
pub enum DuplicateError {
    /// A digest could not be computed; the duplicate is unverifiable and the
    /// file must be skipped rather than risk overwrite or loss.
    HashFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for DuplicateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HashFailed { path, source } => {
                write!(f, "Failed to hash {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for DuplicateError {}

/// The outcome of resolving a destination collision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Content-identical duplicate kept in place; the source is not moved.
    Keep,
    /// Proceed with the move to this path: the original destination for an
    /// overwrite, a collision-free renamed path otherwise.
    Move(PathBuf),
}

/// Resolves a collision between `src` and an existing `dest`.
///
/// Digests of both files are compared first. Unequal digests always take the
/// rename branch without consulting `decider`. Equal digests are a true
/// duplicate and the decider picks between keep, overwrite and rename.
///
/// # Errors
///
/// Returns [`DuplicateError::HashFailed`] when either digest cannot be
/// computed; callers record `duplicate_check_failed` and skip the file.
pub fn resolve(
    src: &Path,
    dest: &Path,
    default: DuplicateAction,
    decider: &dyn DuplicateDecider,
) -> Result<Resolution, DuplicateError> {
    let src_digest = hash::hash_file(src).map_err(|e| DuplicateError::HashFailed {
        path: src.to_path_buf(),
        source: e,
    })?;
    let dest_digest = hash::hash_file(dest).map_err(|e| DuplicateError::HashFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    if src_digest != dest_digest {
        return Ok(Resolution::Move(renamed_destination(dest)));
    }

    match decider.decide(src, dest, default) {
        DuplicateAction::Keep => Ok(Resolution::Keep),
        DuplicateAction::Overwrite => Ok(Resolution::Move(dest.to_path_buf())),
        DuplicateAction::Rename => Ok(Resolution::Move(renamed_destination(dest))),
    }
}

/// Finds a collision-free `{stem}_copy{N}{ext}` sibling of `dest`.
///
/// Existence is re-checked on every increment rather than once up front, so
/// concurrent runs probing the same folder converge on distinct names
/// (best-effort; there is no cross-process locking).
pub fn renamed_destination(dest: &Path) -> PathBuf {
    let parent = dest.parent().unwrap_or_else(|| Path::new(""));
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1;
    loop {
        let candidate = parent.join(format!("{}_copy{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Decider that fails the test if the engine consults it.
    struct MustNotDecide;

    impl DuplicateDecider for MustNotDecide {
        fn decide(&self, _src: &Path, _dest: &Path, _default: DuplicateAction) -> DuplicateAction {
            panic!("decider must not be consulted for unequal content");
        }
    }

    #[test]
    fn test_parse_token() {
        assert_eq!(DuplicateAction::parse_token("k"), Some(DuplicateAction::Keep));
        assert_eq!(
            DuplicateAction::parse_token("Overwrite"),
            Some(DuplicateAction::Overwrite)
        );
        assert_eq!(
            DuplicateAction::parse_token(" r "),
            Some(DuplicateAction::Rename)
        );
        assert_eq!(DuplicateAction::parse_token("x"), None);
        assert_eq!(DuplicateAction::parse_token(""), None);
    }

    #[test]
    fn test_renamed_destination_skips_taken_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "0").unwrap();
        fs::write(base.join("a_copy1.txt"), "1").unwrap();
        fs::write(base.join("a_copy2.txt"), "2").unwrap();

        let renamed = renamed_destination(&base.join("a.txt"));
        assert_eq!(renamed, base.join("a_copy3.txt"));
    }

    #[test]
    fn test_renamed_destination_without_extension() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("README"), "0").unwrap();

        let renamed = renamed_destination(&base.join("README"));
        assert_eq!(renamed, base.join("README_copy1"));
    }

    #[test]
    fn test_unequal_content_always_renames() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("incoming.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&src, "new content").unwrap();
        fs::write(&dest, "old content").unwrap();

        // Keep as default would normally skip; unequal content overrides.
        let resolution =
            resolve(&src, &dest, DuplicateAction::Keep, &MustNotDecide).unwrap();
        assert_eq!(
            resolution,
            Resolution::Move(temp_dir.path().join("existing_copy1.txt"))
        );
    }

    #[test]
    fn test_true_duplicate_keep() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("incoming.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&src, "same").unwrap();
        fs::write(&dest, "same").unwrap();

        let resolution = resolve(&src, &dest, DuplicateAction::Keep, &DefaultPolicy).unwrap();
        assert_eq!(resolution, Resolution::Keep);
    }

    #[test]
    fn test_true_duplicate_overwrite() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("incoming.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&src, "same").unwrap();
        fs::write(&dest, "same").unwrap();

        let resolution =
            resolve(&src, &dest, DuplicateAction::Overwrite, &DefaultPolicy).unwrap();
        assert_eq!(resolution, Resolution::Move(dest.clone()));
    }

    #[test]
    fn test_true_duplicate_rename() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("incoming.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&src, "same").unwrap();
        fs::write(&dest, "same").unwrap();

        let resolution = resolve(&src, &dest, DuplicateAction::Rename, &DefaultPolicy).unwrap();
        assert_eq!(
            resolution,
            Resolution::Move(temp_dir.path().join("existing_copy1.txt"))
        );
    }

    #[test]
    fn test_fn_decider_delegates() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("incoming.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&src, "same").unwrap();
        fs::write(&dest, "same").unwrap();

        let decider = FnDecider::new(|_src: &Path, _dest: &Path, _default| DuplicateAction::Keep);
        let resolution = resolve(&src, &dest, DuplicateAction::Overwrite, &decider).unwrap();
        assert_eq!(resolution, Resolution::Keep);
    }

    #[test]
    fn test_unreadable_file_is_hash_failed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("missing.txt");
        let dest = temp_dir.path().join("existing.txt");
        fs::write(&dest, "content").unwrap();

        let result = resolve(&src, &dest, DuplicateAction::Keep, &DefaultPolicy);
        assert!(matches!(result, Err(DuplicateError::HashFailed { .. })));
    }
}
