//! Destination classification.
//!
//! Maps a file to the relative subfolder it should be sorted into, combining
//! the rule table's category lookup with the metadata resolver's subkey
//! (`Images/1920x1080`, `Audio/185s`, `Documents/Spreadsheets`). Files whose
//! extension no category claims land in `Others`.
//!
//! # Examples
//!
//! ```
//! use metasort::classify::classify;
//! use metasort::config::RuleSet;
//! use metasort::metadata::SystemMetadata;
//! use std::path::Path;
//!
//! let rules = RuleSet::default();
//! let reader = SystemMetadata::new();
//! let dest = classify(Path::new("notes.xyz"), ".xyz", &rules, &reader);
//! assert_eq!(dest, "Others");
//! ```

use crate::config::RuleSet;
use crate::metadata::{self, MetadataReader};
use std::path::Path;

/// Destination for files no category claims.
pub const OTHERS: &str = "Others";

/// Computes the relative destination subfolder for a file.
///
/// `ext` is matched case-insensitively; the leading dot is expected.
/// Categories are consulted in the rule table's declared order, first match
/// wins. Categories with metadata semantics contribute a subkey
/// (`Category/Subkey`); all other categories map to their bare name, as does
/// the `Others` fallback.
///
/// The destination is computed fresh per file and must not be cached across
/// files: metadata can legitimately differ file-to-file within one
/// extension.
pub fn classify(path: &Path, ext: &str, rules: &RuleSet, reader: &dyn MetadataReader) -> String {
    let ext = ext.to_lowercase();
    let Some(category) = rules.category_for(&ext) else {
        return OTHERS.to_string();
    };

    match metadata::resolve_key(path, category, &ext, rules.subfolders(), reader) {
        Some(key) => format!("{}/{}", category, key),
        None => category.to_string(),
    }
}
