//! CLI settings, loaded from an optional TOML file.

use std::path::{Path, PathBuf};

use codemanager_codefile::{
    DEFAULT_EXCLUDE_DIRS, DEFAULT_MAX_BYTES, FilterConfig, OrderMode, WriteMode,
    parse_extension_list,
};
use codemanager_directory_watcher::WatcherConfig;
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};
use crate::manifest::DEFAULT_MANIFEST_PATH;

/// Extensions applied to folders added without an explicit filter.
pub const DEFAULT_FOLDER_EXTS: &str = ".py,.kt,.java,.kts,.gradle,.xml,.md,.txt,.c,.cpp,.h,.hpp";

/// Settings shared by all subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Manifest location.
    pub manifest: PathBuf,

    /// Where artifacts are written (current directory when unset).
    pub output_dir: Option<PathBuf>,

    /// Files larger than this are skipped.
    pub max_bytes: u64,

    /// Extension filter for newly added folders.
    pub default_folder_exts: Vec<String>,

    /// Whether newly added folders are recursive.
    pub recursive: bool,

    /// Directory names excluded from scans and structure documents.
    pub exclude_dirs: Vec<String>,

    /// Path regexes excluded in watch mode.
    pub exclude_file_regexes: Vec<String>,

    /// Extensions included in watch mode (empty means all).
    pub watch_extensions: Vec<String>,

    /// Codefile ordering in watch mode.
    pub order_mode: OrderMode,

    /// How artifacts are written.
    pub write_mode: WriteMode,

    /// Watcher tuning.
    pub watch: WatcherConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from(DEFAULT_MANIFEST_PATH),
            output_dir: None,
            max_bytes: DEFAULT_MAX_BYTES,
            default_folder_exts: parse_extension_list(DEFAULT_FOLDER_EXTS),
            recursive: true,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(ToString::to_string).collect(),
            exclude_file_regexes: Vec::new(),
            watch_extensions: Vec::new(),
            order_mode: OrderMode::ByPath,
            write_mode: WriteMode::Overwrite,
            watch: WatcherConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let wrap = |message: String| CliError::Settings {
            path: path.display().to_string(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| wrap(e.to_string()))?;
        toml::from_str(&text).map_err(|e| wrap(e.to_string()))
    }

    /// Output directory, defaulting to the current directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Filter used when watching a root.
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            include_extensions: self.watch_extensions.clone(),
            exclude_dir_names: self.exclude_dirs.clone(),
            exclude_file_regexes: self.exclude_file_regexes.clone(),
            max_bytes: self.max_bytes,
            order_mode: self.order_mode,
            max_depth: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codemanager_directory_watcher::BackendKind;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();

        assert_eq!(settings.manifest, PathBuf::from(".codemanager/manifest.json"));
        assert_eq!(settings.output_dir(), PathBuf::from("."));
        assert_eq!(settings.default_folder_exts.len(), 12);
        assert!(settings.default_folder_exts.contains(&".kts".to_string()));
        assert!(settings.exclude_dirs.contains(&".gradle".to_string()));
        assert_eq!(settings.watch.debounce_ms, 400);
    }

    #[test]
    fn test_partial_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("codemanager.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "/tmp/out"
max_bytes = 2048
exclude_file_regexes = ['\.lock$']
order_mode = "mtime"
write_mode = "atomic"

[watch]
debounce_ms = 250
backend = "polling"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.output_dir(), PathBuf::from("/tmp/out"));
        assert_eq!(settings.write_mode, WriteMode::Atomic);
        assert_eq!(settings.watch.backend, BackendKind::Polling);
        assert_eq!(settings.watch.poll_interval_ms, 1000);
        assert!(settings.recursive);

        let filter = settings.filter_config();
        assert_eq!(filter.max_bytes, 2048);
        assert_eq!(filter.order_mode, OrderMode::ByModifiedTime);
        assert_eq!(filter.exclude_file_regexes, vec![r"\.lock$".to_string()]);
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "max_bytes = \"lots\"").unwrap();

        assert!(matches!(
            Settings::load(Some(&path)),
            Err(CliError::Settings { .. })
        ));
    }
}
