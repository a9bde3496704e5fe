//! Physical file relocation with timestamp preservation.
//!
//! The destination keeps the source's access and modification times, so a
//! sorted file reflects its own history rather than the time of the move.
//! In preview mode the traversal engine never calls into this module.

use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Moves `src` to `dest`, preserving access and modification times.
///
/// Renames when possible and falls back to copy + remove when the rename
/// fails (e.g. across devices; best-effort, no atomicity guarantee there).
/// Timestamps are captured before the relocation and applied afterwards.
///
/// # Errors
///
/// Returns an `io::Error` when the source cannot be inspected, the
/// relocation fails, or the timestamps cannot be applied.
pub fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    let metadata = fs::metadata(src)?;
    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);

    if let Err(e) = fs::rename(src, dest) {
        warn!(
            src = %src.display(),
            dest = %dest.display(),
            "Rename failed ({}), falling back to copy and remove",
            e
        );
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }

    filetime::set_file_times(dest, atime, mtime)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_move_relocates_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("file.txt");
        let dest_dir = temp_dir.path().join("sorted");
        fs::create_dir(&dest_dir).unwrap();
        fs::write(&src, "payload").unwrap();

        let dest = dest_dir.join("file.txt");
        move_file(&src, &dest).expect("Failed to move file");

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "payload");
    }

    #[test]
    fn test_move_preserves_timestamps() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("file.txt");
        fs::write(&src, "payload").unwrap();

        let stamp = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_times(&src, stamp, stamp).unwrap();

        let dest = temp_dir.path().join("moved.txt");
        move_file(&src, &dest).expect("Failed to move file");

        let metadata = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&metadata), stamp);
    }

    #[test]
    fn test_move_overwrites_existing_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("new.txt");
        let dest = temp_dir.path().join("old.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dest, "old").unwrap();

        move_file(&src, &dest).expect("Failed to move file");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_move_into_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("file.txt");
        fs::write(&src, "payload").unwrap();

        let dest = temp_dir.path().join("no_such_dir").join("file.txt");
        assert!(move_file(&src, &dest).is_err());
        assert!(src.exists());
    }
}
