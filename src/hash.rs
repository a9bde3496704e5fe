//! Content digest computation for duplicate detection.
//!
//! Digests are used solely to decide whether two files that collide on a
//! destination name are byte-identical. Results are never cached across
//! calls, since files may change between them.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// A SHA-256 content digest.
pub type FileDigest = [u8; 32];

/// Computes the SHA-256 digest of a file's contents.
///
/// The file is read in full; callers must not assume this is cheap for very
/// large files.
///
/// # Errors
///
/// Returns an `io::Error` when the path cannot be opened or read.
pub fn hash_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().into())
}
