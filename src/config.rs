//! Classification rule and filter configuration.
//!
//! The rule table drives every traversal: an ordered list of categories with
//! their extension sets, an extension → document subfolder map, the default
//! duplicate action, and optional ignore rules. It is loaded from TOML,
//! validated once, and passed by reference into every traversal call.
//!
//! # Configuration File Format
//!
//! ```toml
//! default_duplicate_action = "r"   # "k" | "o" | "r"
//!
//! [[categories]]                   # declared order = match order
//! name = "Images"
//! extensions = [".jpg", ".png"]
//!
//! [[categories]]
//! name = "Documents"
//! extensions = [".pdf", ".docx", ".txt"]
//!
//! [subfolders]
//! ".docx" = "Word"
//! ".pdf" = "PDF"
//!
//! [filters]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp"]
//! extensions = [".part"]
//! ```

use crate::duplicate::DuplicateAction;
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// A category with an empty name or no extensions.
    InvalidCategory(String),
    /// Unknown duplicate action token.
    InvalidDuplicateAction(String),
    /// Invalid glob pattern in the filter rules.
    InvalidGlobPattern(String),
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidCategory(msg) => write!(f, "Invalid category: {}", msg),
            ConfigError::InvalidDuplicateAction(token) => {
                write!(
                    f,
                    "Invalid duplicate action '{}': expected k, o or r",
                    token
                )
            }
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One category rule: a name and the extensions it claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub extensions: Vec<String>,
}

/// Ignore rules applied before classification. Matching files are skipped
/// silently and never counted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Exact filenames to skip (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to skip (e.g., "*.tmp").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to skip (e.g., ".part").
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// The deserialized configuration, prior to validation.
///
/// Category declaration order is match order: when extension sets overlap,
/// the first-declared category wins. Keeping the sets disjoint is the
/// caller's responsibility and is not validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Duplicate action token: `"k"` (keep), `"o"` (overwrite), `"r"` (rename).
    #[serde(default = "default_duplicate_token")]
    pub default_duplicate_action: String,

    #[serde(default)]
    pub categories: Vec<CategoryRule>,

    /// Extension → document subfolder name.
    #[serde(default)]
    pub subfolders: HashMap<String, String>,

    #[serde(default)]
    pub filters: FilterRules,
}

fn default_duplicate_token() -> String {
    "k".to_string()
}

impl RuleConfig {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.metasortrc.toml` in the current directory
    /// 3. Look for `~/.config/metasort/config.toml` in home directory
    /// 4. Fall back to the built-in default rule table
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".metasortrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("metasort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validate and compile the configuration into a [`RuleSet`].
    ///
    /// # Errors
    ///
    /// Returns an error for empty category names or extension lists, unknown
    /// duplicate action tokens, or invalid glob patterns.
    pub fn compile(self) -> Result<RuleSet, ConfigError> {
        RuleSet::new(self)
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        let category = |name: &str, extensions: &[&str]| CategoryRule {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        };

        let mut subfolders = HashMap::new();
        for (ext, subfolder) in [
            (".pdf", "PDF"),
            (".doc", "Word"),
            (".docx", "Word"),
            (".xls", "Spreadsheets"),
            (".xlsx", "Spreadsheets"),
            (".csv", "Spreadsheets"),
            (".ppt", "Presentations"),
            (".pptx", "Presentations"),
        ] {
            subfolders.insert(ext.to_string(), subfolder.to_string());
        }

        Self {
            default_duplicate_action: "k".to_string(),
            categories: vec![
                category(
                    "Images",
                    &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff"],
                ),
                category("Audio", &[".mp3", ".wav", ".flac", ".ogg", ".m4a", ".aac"]),
                category("Video", &[".mp4", ".avi", ".mov", ".mkv", ".wmv"]),
                category(
                    "Documents",
                    &[
                        ".pdf", ".doc", ".docx", ".txt", ".md", ".rtf", ".odt", ".xls", ".xlsx",
                        ".csv", ".ppt", ".pptx",
                    ],
                ),
                category("Archives", &[".zip", ".tar", ".gz", ".rar", ".7z"]),
            ],
            subfolders,
            filters: FilterRules {
                filenames: vec![".DS_Store".to_string(), "Thumbs.db".to_string()],
                patterns: Vec::new(),
                extensions: Vec::new(),
            },
        }
    }
}

/// A validated category: name plus its normalized extension set.
#[derive(Debug, Clone)]
struct Category {
    name: String,
    extensions: HashSet<String>,
}

/// The validated, immutable rule table consumed by the traversal engine.
///
/// Created once per run; read-only thereafter.
#[derive(Debug, Clone)]
pub struct RuleSet {
    categories: Vec<Category>,
    subfolders: HashMap<String, String>,
    default_action: DuplicateAction,
    filters: CompiledFilters,
}

impl RuleSet {
    fn new(config: RuleConfig) -> Result<Self, ConfigError> {
        let default_action = DuplicateAction::parse_token(&config.default_duplicate_action)
            .ok_or_else(|| {
                ConfigError::InvalidDuplicateAction(config.default_duplicate_action.clone())
            })?;

        let mut categories = Vec::with_capacity(config.categories.len());
        for rule in &config.categories {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::InvalidCategory(
                    "category name must not be empty".to_string(),
                ));
            }
            if rule.extensions.is_empty() {
                return Err(ConfigError::InvalidCategory(format!(
                    "category '{}' has no extensions",
                    rule.name
                )));
            }
            categories.push(Category {
                name: rule.name.clone(),
                extensions: rule
                    .extensions
                    .iter()
                    .map(|e| normalize_extension(e))
                    .collect(),
            });
        }

        let subfolders = config
            .subfolders
            .iter()
            .map(|(ext, subfolder)| (normalize_extension(ext), subfolder.clone()))
            .collect();

        let filters = CompiledFilters::new(&config.filters)?;

        Ok(Self {
            categories,
            subfolders,
            default_action,
            filters,
        })
    }

    /// Returns the first-declared category claiming `ext` (lowercase, with
    /// leading dot), or `None`.
    pub fn category_for(&self, ext: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|category| category.extensions.contains(ext))
            .map(|category| category.name.as_str())
    }

    /// The extension → document subfolder map.
    pub fn subfolders(&self) -> &HashMap<String, String> {
        &self.subfolders
    }

    /// The configured default duplicate action.
    pub fn default_action(&self) -> DuplicateAction {
        self.default_action
    }

    /// Whether the traversal should process this file at all.
    pub fn should_include(&self, path: &Path) -> bool {
        self.filters.should_include(path)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        // The built-in table is known-valid.
        RuleConfig::default()
            .compile()
            .expect("default rule table must compile")
    }
}

/// Normalizes an extension to lowercase with a leading dot.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Pre-compiled ignore rules for efficient per-file matching.
#[derive(Debug, Clone)]
struct CompiledFilters {
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            filenames: rules.filenames.iter().cloned().collect(),
            extensions: rules
                .extensions
                .iter()
                .map(|e| normalize_extension(e))
                .collect(),
            patterns,
        })
    }

    fn should_include(&self, path: &Path) -> bool {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = path.extension() {
            let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
            if self.extensions.contains(&dotted) {
                return false;
            }
        }

        !self
            .patterns
            .iter()
            .any(|pattern| pattern.matches(file_name.as_ref()))
    }
}
