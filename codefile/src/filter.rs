//! Filter configuration shared by the selector and the watcher.

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::sync::Arc;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CodefileError, Result};

/// Default size limit for a single file, in bytes.
pub const DEFAULT_MAX_BYTES: u64 = 1_000_000;

/// Directory names pruned from every scan unless configured otherwise.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    "node_modules",
    ".venv",
    "build",
    "dist",
    ".idea",
    ".gradle",
];

/// How selected files are ordered in the codefile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderMode {
    /// Case-insensitive absolute path order.
    #[default]
    #[serde(alias = "path")]
    ByPath,

    /// Ascending last-modified time.
    #[serde(alias = "mtime")]
    ByModifiedTime,
}

/// Plain, serializable filter settings.
///
/// Compile into a [`FileFilter`] before use; compilation normalizes the
/// extension set and validates the exclusion regexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Extensions to include (empty means all files).
    pub include_extensions: Vec<String>,

    /// Directory names excluded at any depth.
    pub exclude_dir_names: Vec<String>,

    /// Regexes searched in the absolute path of each file.
    pub exclude_file_regexes: Vec<String>,

    /// Files larger than this are skipped.
    pub max_bytes: u64,

    /// Output ordering.
    pub order_mode: OrderMode,

    /// Maximum depth to recurse (None = unlimited, 1 = direct children).
    pub max_depth: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_extensions: Vec::new(),
            exclude_dir_names: DEFAULT_EXCLUDE_DIRS.iter().map(ToString::to_string).collect(),
            exclude_file_regexes: Vec::new(),
            max_bytes: DEFAULT_MAX_BYTES,
            order_mode: OrderMode::ByPath,
            max_depth: None,
        }
    }
}

impl FilterConfig {
    /// Create a config with default exclusions and no extension filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict selection to the given extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the excluded directory names.
    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dir_names = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Add an excluded directory name.
    pub fn exclude_dir(mut self, name: impl Into<String>) -> Self {
        self.exclude_dir_names.push(name.into());
        self
    }

    /// Add a file exclusion regex.
    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_file_regexes.push(pattern.into());
        self
    }

    /// Set the size limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set the ordering.
    pub fn with_order(mut self, order_mode: OrderMode) -> Self {
        self.order_mode = order_mode;
        self
    }

    /// Only consider direct children of the root.
    pub fn non_recursive(mut self) -> Self {
        self.max_depth = Some(1);
        self
    }

    /// Validate and compile into a [`FileFilter`].
    pub fn compile(self) -> Result<FileFilter> {
        FileFilter::new(self)
    }
}

/// Normalize a user-supplied extension to lowercase dotted form.
///
/// `"PY"`, `"py"` and `".Py"` all become `".py"`. Blank input yields `None`.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// Parse a comma-separated extension list such as `".py, .RS,md"`.
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(',').filter_map(normalize_extension).collect()
}

/// Compiled filter used on every scan and every watcher event.
#[derive(Debug, Clone)]
pub struct FileFilter {
    config: Arc<FilterConfig>,
    extensions: Arc<BTreeSet<String>>,
    exclude_dirs: Arc<BTreeSet<String>>,
    exclude_regexes: Arc<Vec<Regex>>,
}

impl FileFilter {
    /// Compile a filter config.
    pub fn new(config: FilterConfig) -> Result<Self> {
        if config.max_bytes == 0 {
            return Err(CodefileError::Config(
                "max_bytes must be a positive integer".to_string(),
            ));
        }

        let extensions = config
            .include_extensions
            .iter()
            .map(String::as_str)
            .filter_map(normalize_extension)
            .collect();

        let exclude_dirs = config
            .exclude_dir_names
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let exclude_regexes = config
            .exclude_file_regexes
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| CodefileError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config: Arc::new(config),
            extensions: Arc::new(extensions),
            exclude_dirs: Arc::new(exclude_dirs),
            exclude_regexes: Arc::new(exclude_regexes),
        })
    }

    /// The config this filter was compiled from.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn order_mode(&self) -> OrderMode {
        self.config.order_mode
    }

    pub fn max_bytes(&self) -> u64 {
        self.config.max_bytes
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.config.max_depth
    }

    /// Excluded directory names, sorted.
    pub fn exclude_dir_names(&self) -> impl Iterator<Item = &str> {
        self.exclude_dirs.iter().map(String::as_str)
    }

    /// Check a single directory name against the exclusion set.
    pub fn is_excluded_dir_name(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name)
    }

    /// Check whether any segment of a root-relative path is an excluded
    /// directory name.
    pub fn has_excluded_segment(&self, relative: &Path) -> bool {
        relative.components().any(|component| match component {
            Component::Normal(part) => self.is_excluded_dir_name(&part.to_string_lossy()),
            _ => false,
        })
    }

    /// Check the file's extension against the include set.
    pub fn matches_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match path.extension() {
            Some(ext) => {
                let dotted = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.extensions.contains(&dotted)
            }
            None => false,
        }
    }

    /// Check the absolute path string against the exclusion regexes.
    pub fn is_excluded_file(&self, path: &Path) -> bool {
        if self.exclude_regexes.is_empty() {
            return false;
        }
        let path_str = path.to_string_lossy();
        self.exclude_regexes.iter().any(|rx| rx.is_match(&path_str))
    }

    /// Check a file size against the limit.
    pub fn exceeds_size_limit(&self, size: u64) -> bool {
        size > self.config.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PY"), Some(".py".to_string()));
        assert_eq!(normalize_extension(" .Rs "), Some(".rs".to_string()));
        assert_eq!(normalize_extension("."), None);
        assert_eq!(normalize_extension("  "), None);
    }

    #[test]
    fn test_parse_extension_list() {
        assert_eq!(
            parse_extension_list(".py, KT,,md"),
            vec![".py".to_string(), ".kt".to_string(), ".md".to_string()]
        );
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        let filter = FilterConfig::new().with_extensions(["py"]).compile().unwrap();

        assert!(filter.matches_extension(Path::new("/p/a.py")));
        assert!(filter.matches_extension(Path::new("/p/A.PY")));
        assert!(!filter.matches_extension(Path::new("/p/a.rs")));
        assert!(!filter.matches_extension(Path::new("/p/Makefile")));
    }

    #[test]
    fn test_empty_extension_set_matches_everything() {
        let filter = FilterConfig::new().compile().unwrap();
        assert!(filter.matches_extension(Path::new("/p/Makefile")));
    }

    #[test]
    fn test_excluded_segment_at_any_depth() {
        let filter = FilterConfig::new().compile().unwrap();

        assert!(filter.has_excluded_segment(Path::new(".git/config")));
        assert!(filter.has_excluded_segment(Path::new("a/b/node_modules/x/index.js")));
        assert!(!filter.has_excluded_segment(Path::new("src/gitlike/main.rs")));
    }

    #[test]
    fn test_regex_exclusion() {
        let filter = FilterConfig::new()
            .exclude_pattern(r"\.min\.js$")
            .compile()
            .unwrap();

        assert!(filter.is_excluded_file(Path::new("/w/app.min.js")));
        assert!(!filter.is_excluded_file(Path::new("/w/app.js")));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = FilterConfig::new().exclude_pattern("(").compile().unwrap_err();
        assert!(matches!(err, CodefileError::InvalidPattern { .. }));
    }

    #[test]
    fn test_zero_max_bytes_rejected() {
        let err = FilterConfig::new().with_max_bytes(0).compile().unwrap_err();
        assert!(matches!(err, CodefileError::Config(_)));
    }

    #[test]
    fn test_order_mode_accepts_short_aliases() {
        let mode: OrderMode = serde_json::from_str("\"mtime\"").unwrap();
        assert_eq!(mode, OrderMode::ByModifiedTime);
        let mode: OrderMode = serde_json::from_str("\"by_path\"").unwrap();
        assert_eq!(mode, OrderMode::ByPath);
    }
}
