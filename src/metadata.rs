//! Metadata extraction backends and the classification-key resolver.
//!
//! Each backend is a fallible, independently replaceable reader behind the
//! [`MetadataReader`] trait: image dimensions come from an image header read,
//! audio and video durations from an `ffprobe` subprocess. Backend failures
//! are isolated per file — the resolver maps them to `Unknown_*` keys so a
//! single unreadable file never aborts a run.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::warn;

/// Category name with image-dimension classification semantics.
pub const CATEGORY_IMAGES: &str = "Images";
/// Category name with audio-duration classification semantics.
pub const CATEGORY_AUDIO: &str = "Audio";
/// Category name with video-duration classification semantics.
pub const CATEGORY_VIDEO: &str = "Video";
/// Category name with document-subfolder classification semantics.
pub const CATEGORY_DOCUMENTS: &str = "Documents";

/// Container extensions the video duration probe accepts. Anything else
/// fails fast with [`MetadataError::UnsupportedFormat`] before a probe is
/// attempted.
pub const SUPPORTED_VIDEO_CONTAINERS: &[&str] = &[".mp4", ".avi", ".mov", ".mkv", ".wmv"];

/// Errors raised by metadata extraction backends.
#[derive(Debug, Clone)]
pub enum MetadataError {
    /// The backend could not open or decode the file.
    ReadFailed { path: PathBuf, reason: String },
    /// The probe subprocess could not be spawned or exited unsuccessfully.
    ProbeFailed { path: PathBuf, reason: String },
    /// The probe ran but produced output that could not be parsed.
    ParseFailed { reason: String },
    /// The container extension is not recognized by the duration probe.
    UnsupportedFormat { extension: String },
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, reason } => {
                write!(f, "Failed to read metadata from {}: {}", path.display(), reason)
            }
            Self::ProbeFailed { path, reason } => {
                write!(f, "Duration probe failed for {}: {}", path.display(), reason)
            }
            Self::ParseFailed { reason } => {
                write!(f, "Failed to parse probe output: {}", reason)
            }
            Self::UnsupportedFormat { extension } => {
                write!(f, "Unsupported video format: {}", extension)
            }
        }
    }
}

impl std::error::Error for MetadataError {}

/// Pluggable metadata backends.
///
/// Implementations must be pure in the sense that a call only inspects the
/// file at `path`; results are never cached by callers.
pub trait MetadataReader {
    /// Returns the pixel dimensions `(width, height)` of an image file.
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), MetadataError>;

    /// Returns the duration of an audio file in fractional seconds, or
    /// `None` when the container does not carry one.
    fn audio_duration(&self, path: &Path) -> Result<Option<f64>, MetadataError>;

    /// Returns the duration of a video file in fractional seconds, or
    /// `None` when the container does not carry one.
    fn video_duration(&self, path: &Path) -> Result<Option<f64>, MetadataError>;
}

/// Production metadata backends: image header reads plus `ffprobe`.
#[derive(Debug, Clone)]
pub struct SystemMetadata {
    ffprobe_path: PathBuf,
}

impl SystemMetadata {
    /// Creates backends that expect `ffprobe` on the `PATH`.
    pub fn new() -> Self {
        Self {
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }

    /// Creates backends with an explicit `ffprobe` binary location.
    pub fn with_ffprobe_path(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Runs `ffprobe` against `path` and extracts the format duration.
    fn probe_duration(&self, path: &Path) -> Result<Option<f64>, MetadataError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| MetadataError::ProbeFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(MetadataError::ProbeFailed {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Default for SystemMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataReader for SystemMetadata {
    fn image_dimensions(&self, path: &Path) -> Result<(u32, u32), MetadataError> {
        image::image_dimensions(path).map_err(|e| MetadataError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn audio_duration(&self, path: &Path) -> Result<Option<f64>, MetadataError> {
        self.probe_duration(path)
    }

    fn video_duration(&self, path: &Path) -> Result<Option<f64>, MetadataError> {
        let ext = lowercase_extension(path);
        if !SUPPORTED_VIDEO_CONTAINERS.contains(&ext.as_str()) {
            return Err(MetadataError::UnsupportedFormat { extension: ext });
        }
        self.probe_duration(path)
    }
}

/// Parses `ffprobe -print_format json -show_format` output into a duration.
///
/// A present but unparsable duration string is treated as absent; malformed
/// JSON is an error.
fn parse_probe_duration(output: &str) -> Result<Option<f64>, MetadataError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }

    let probe: ProbeOutput =
        serde_json::from_str(output).map_err(|e| MetadataError::ParseFailed {
            reason: e.to_string(),
        })?;

    Ok(probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok()))
}

/// Returns the lowercase extension of `path` including the leading dot, or
/// an empty string when there is none.
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Resolves the classification subkey for a file in `category`.
///
/// Returns `None` for categories without metadata semantics — the classifier
/// uses the bare category name as the destination for those. Backend
/// failures resolve to `Unknown_Size` / `Unknown_Duration` so the run
/// continues.
pub fn resolve_key(
    path: &Path,
    category: &str,
    ext: &str,
    subfolders: &HashMap<String, String>,
    reader: &dyn MetadataReader,
) -> Option<String> {
    match category {
        CATEGORY_IMAGES => Some(match reader.image_dimensions(path) {
            Ok((width, height)) => format!("{}x{}", width, height),
            Err(e) => {
                warn!(path = %path.display(), "Could not read image size: {}", e);
                "Unknown_Size".to_string()
            }
        }),
        CATEGORY_AUDIO => Some(duration_key(reader.audio_duration(path), path)),
        CATEGORY_VIDEO => Some(duration_key(reader.video_duration(path), path)),
        CATEGORY_DOCUMENTS => Some(
            subfolders
                .get(ext)
                .cloned()
                .unwrap_or_else(|| "Other_Documents".to_string()),
        ),
        _ => None,
    }
}

/// Formats a duration result as a whole-second key.
fn duration_key(result: Result<Option<f64>, MetadataError>, path: &Path) -> String {
    match result {
        Ok(duration) => format!("{}s", truncate_seconds(duration)),
        Err(e) => {
            warn!(path = %path.display(), "Could not read duration: {}", e);
            "Unknown_Duration".to_string()
        }
    }
}

/// Truncates a duration toward zero; negative or missing values become 0.
fn truncate_seconds(duration: Option<f64>) -> i64 {
    match duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs.trunc() as i64,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Stub backends with fixed answers, for resolver tests.
    struct FixedMetadata {
        dimensions: Result<(u32, u32), MetadataError>,
        duration: Result<Option<f64>, MetadataError>,
    }

    impl FixedMetadata {
        fn ok(dimensions: (u32, u32), duration: f64) -> Self {
            Self {
                dimensions: Ok(dimensions),
                duration: Ok(Some(duration)),
            }
        }

        fn failing() -> Self {
            Self {
                dimensions: Err(MetadataError::ReadFailed {
                    path: PathBuf::from("x"),
                    reason: "boom".to_string(),
                }),
                duration: Err(MetadataError::ProbeFailed {
                    path: PathBuf::from("x"),
                    reason: "boom".to_string(),
                }),
            }
        }
    }

    impl MetadataReader for FixedMetadata {
        fn image_dimensions(&self, _path: &Path) -> Result<(u32, u32), MetadataError> {
            self.dimensions.clone()
        }

        fn audio_duration(&self, _path: &Path) -> Result<Option<f64>, MetadataError> {
            self.duration.clone()
        }

        fn video_duration(&self, _path: &Path) -> Result<Option<f64>, MetadataError> {
            self.duration.clone()
        }
    }

    /// Writes a minimal 24-bit BMP so the image backend has real bytes to
    /// parse without shipping binary fixtures.
    fn write_bmp(path: &Path, width: u32, height: u32) {
        let row_size = (width * 3).div_ceil(4) * 4;
        let pixel_bytes = row_size * height;
        let file_size = 54 + pixel_bytes;

        let mut data = Vec::with_capacity(file_size as usize);
        data.extend_from_slice(b"BM");
        data.extend_from_slice(&file_size.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&54u32.to_le_bytes());
        data.extend_from_slice(&40u32.to_le_bytes());
        data.extend_from_slice(&(width as i32).to_le_bytes());
        data.extend_from_slice(&(height as i32).to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&24u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&pixel_bytes.to_le_bytes());
        data.extend_from_slice(&2835i32.to_le_bytes());
        data.extend_from_slice(&2835i32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.resize(file_size as usize, 0);

        let mut file = File::create(path).expect("Failed to create BMP");
        file.write_all(&data).expect("Failed to write BMP");
    }

    #[test]
    fn test_image_dimensions_from_bmp_header() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let bmp = temp_dir.path().join("sample.bmp");
        write_bmp(&bmp, 100, 60);

        let reader = SystemMetadata::new();
        assert_eq!(reader.image_dimensions(&bmp).unwrap(), (100, 60));
    }

    #[test]
    fn test_image_dimensions_rejects_garbage() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let bogus = temp_dir.path().join("not_an_image.bmp");
        std::fs::write(&bogus, b"definitely not a bitmap").unwrap();

        let reader = SystemMetadata::new();
        assert!(reader.image_dimensions(&bogus).is_err());
    }

    #[test]
    fn test_unsupported_video_container_fails_fast() {
        // No probe binary needed: the extension check runs first.
        let reader = SystemMetadata::with_ffprobe_path("/nonexistent/ffprobe");
        let result = reader.video_duration(Path::new("clip.flv"));
        match result {
            Err(MetadataError::UnsupportedFormat { extension }) => {
                assert_eq!(extension, ".flv");
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_supported_video_containers() {
        for ext in ["mp4", "avi", "mov", "mkv", "wmv"] {
            assert!(SUPPORTED_VIDEO_CONTAINERS.contains(&format!(".{}", ext).as_str()));
        }
    }

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{
            "format": {
                "filename": "song.mp3",
                "format_name": "mp3",
                "duration": "185.723",
                "size": "4500000"
            }
        }"#;
        let duration = parse_probe_duration(json).unwrap();
        assert!((duration.unwrap() - 185.723).abs() < 0.001);
    }

    #[test]
    fn test_parse_probe_duration_missing_field() {
        let json = r#"{"format": {"format_name": "mp3"}}"#;
        assert_eq!(parse_probe_duration(json).unwrap(), None);
    }

    #[test]
    fn test_parse_probe_duration_malformed_json() {
        assert!(parse_probe_duration("not json").is_err());
    }

    #[test]
    fn test_truncate_seconds() {
        assert_eq!(truncate_seconds(Some(185.9)), 185);
        assert_eq!(truncate_seconds(Some(0.4)), 0);
        assert_eq!(truncate_seconds(Some(-3.0)), 0);
        assert_eq!(truncate_seconds(None), 0);
    }

    #[test]
    fn test_lowercase_extension() {
        assert_eq!(lowercase_extension(Path::new("photo.JPG")), ".jpg");
        assert_eq!(lowercase_extension(Path::new("archive.tar.GZ")), ".gz");
        assert_eq!(lowercase_extension(Path::new("README")), "");
    }

    #[test]
    fn test_resolve_key_images() {
        let reader = FixedMetadata::ok((1920, 1080), 0.0);
        let key = resolve_key(
            Path::new("p.jpg"),
            CATEGORY_IMAGES,
            ".jpg",
            &HashMap::new(),
            &reader,
        );
        assert_eq!(key, Some("1920x1080".to_string()));
    }

    #[test]
    fn test_resolve_key_image_failure_is_unknown_size() {
        let reader = FixedMetadata::failing();
        let key = resolve_key(
            Path::new("p.jpg"),
            CATEGORY_IMAGES,
            ".jpg",
            &HashMap::new(),
            &reader,
        );
        assert_eq!(key, Some("Unknown_Size".to_string()));
    }

    #[test]
    fn test_resolve_key_audio_truncates() {
        let reader = FixedMetadata::ok((0, 0), 185.9);
        let key = resolve_key(
            Path::new("s.mp3"),
            CATEGORY_AUDIO,
            ".mp3",
            &HashMap::new(),
            &reader,
        );
        assert_eq!(key, Some("185s".to_string()));
    }

    #[test]
    fn test_resolve_key_duration_failure_is_unknown_duration() {
        let reader = FixedMetadata::failing();
        let key = resolve_key(
            Path::new("v.mp4"),
            CATEGORY_VIDEO,
            ".mp4",
            &HashMap::new(),
            &reader,
        );
        assert_eq!(key, Some("Unknown_Duration".to_string()));
    }

    #[test]
    fn test_resolve_key_documents() {
        let mut subfolders = HashMap::new();
        subfolders.insert(".docx".to_string(), "Word".to_string());

        let reader = FixedMetadata::failing();
        assert_eq!(
            resolve_key(
                Path::new("r.docx"),
                CATEGORY_DOCUMENTS,
                ".docx",
                &subfolders,
                &reader
            ),
            Some("Word".to_string())
        );
        assert_eq!(
            resolve_key(
                Path::new("n.txt"),
                CATEGORY_DOCUMENTS,
                ".txt",
                &subfolders,
                &reader
            ),
            Some("Other_Documents".to_string())
        );
    }

    #[test]
    fn test_resolve_key_plain_category() {
        let reader = FixedMetadata::failing();
        assert_eq!(
            resolve_key(
                Path::new("a.zip"),
                "Archives",
                ".zip",
                &HashMap::new(),
                &reader
            ),
            None
        );
    }
}
