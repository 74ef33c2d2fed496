//! Persistent tracked set.
//!
//! The manifest lists explicitly tracked files and folders (with their
//! extension filter). Paths are stored exactly as the user entered them and
//! normalised when used, so a manifest written on Windows keeps working under
//! WSL.
//!
//! Loading never fails: a missing or corrupt file yields an empty manifest,
//! and the older `{ "tracked": [...] }` layout is migrated in place.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CliError, Result};
use crate::paths::{normalize_input_path, resolve_input_path};

/// Current on-disk format version.
pub const MANIFEST_VERSION: u32 = 2;

/// Default manifest location, relative to the working directory.
pub const DEFAULT_MANIFEST_PATH: &str = ".codemanager/manifest.json";

/// Format of `last_compiled`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An explicitly tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Path as entered.
    pub path: String,
}

/// A tracked folder and the files it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFolder {
    /// Path as entered.
    pub path: String,

    /// Lowercase dotted extensions (empty means all files).
    pub exts: Vec<String>,

    /// Whether subfolders are included.
    pub recursive: bool,
}

/// The tracked set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub files: Vec<TrackedFile>,
    pub folders: Vec<TrackedFolder>,
    pub last_compiled: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            files: Vec::new(),
            folders: Vec::new(),
            last_compiled: None,
        }
    }
}

impl Manifest {
    /// Load from `path`, falling back to an empty manifest.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No manifest at {}, starting empty", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Failed to read manifest {}: {e}", path.display());
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Self::from_value(&value),
            Err(e) => {
                warn!("Ignoring corrupt manifest {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Build a manifest from loosely shaped JSON, dropping malformed entries.
    pub fn from_value(value: &Value) -> Self {
        let mut files: Vec<TrackedFile> = entries(value, "files")
            .filter_map(|f| non_empty_str(f.get("path")))
            .map(|path| TrackedFile { path })
            .collect();

        if files.is_empty() {
            files = entries(value, "tracked")
                .filter_map(|t| non_empty_str(Some(t)))
                .map(|path| TrackedFile { path })
                .collect();
            if !files.is_empty() {
                debug!("Migrated {} entries from v1 manifest", files.len());
            }
        }

        let folders = entries(value, "folders")
            .filter_map(|f| {
                let path = non_empty_str(f.get("path"))?;
                Some(TrackedFolder {
                    path,
                    exts: parse_exts(f.get("exts")),
                    recursive: f.get("recursive").and_then(Value::as_bool).unwrap_or(true),
                })
            })
            .collect();

        Self {
            version: MANIFEST_VERSION,
            files,
            folders,
            last_compiled: non_empty_str(value.get("last_compiled")),
        }
    }

    /// Write as pretty JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let wrap = |message: String| CliError::Manifest {
            path: path.display().to_string(),
            message,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| wrap(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| wrap(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| wrap(e.to_string()))?;
        debug!("Saved manifest to {}", path.display());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty()
    }

    /// Track a file. Returns `Ok(false)` if the same raw path is already
    /// tracked.
    pub fn add_file(&mut self, raw: &str) -> Result<bool> {
        let raw = raw.trim();
        let resolved = existing(raw)?;
        if !resolved.is_file() {
            return Err(CliError::NotAFile(resolved.display().to_string()));
        }
        if self.files.iter().any(|f| f.path == raw) {
            return Ok(false);
        }
        self.files.push(TrackedFile {
            path: raw.to_string(),
        });
        Ok(true)
    }

    /// Track a folder. Returns `Ok(false)` if the same raw path is already
    /// tracked.
    pub fn add_folder(&mut self, raw: &str, exts: &[String], recursive: bool) -> Result<bool> {
        let raw = raw.trim();
        let resolved = existing(raw)?;
        if !resolved.is_dir() {
            return Err(CliError::NotADirectory(resolved.display().to_string()));
        }
        if self.folders.iter().any(|f| f.path == raw) {
            return Ok(false);
        }
        self.folders.push(TrackedFolder {
            path: raw.to_string(),
            exts: exts
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            recursive,
        });
        Ok(true)
    }

    /// Remove files whose raw path equals `raw`. Returns the number removed.
    pub fn remove_file(&mut self, raw: &str) -> usize {
        let raw = raw.trim();
        let before = self.files.len();
        self.files.retain(|f| f.path != raw);
        before - self.files.len()
    }

    /// Remove folders whose raw path equals `raw`. Returns the number removed.
    pub fn remove_folder(&mut self, raw: &str) -> usize {
        let raw = raw.trim();
        let before = self.folders.len();
        self.folders.retain(|f| f.path != raw);
        before - self.folders.len()
    }

    /// Record a successful compile.
    pub fn mark_compiled(&mut self, at: DateTime<Local>) {
        self.last_compiled = Some(at.format(TIMESTAMP_FORMAT).to_string());
    }
}

fn existing(raw: &str) -> Result<PathBuf> {
    let resolved = resolve_input_path(raw);
    if resolved.exists() {
        Ok(resolved)
    } else {
        Err(CliError::PathNotFound {
            raw: raw.to_string(),
            normalized: normalize_input_path(raw),
        })
    }
}

fn entries<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Extensions may be stored as a list or a comma-separated string.
fn parse_exts(value: Option<&Value>) -> Vec<String> {
    let normalize = |s: &str| {
        let s = s.trim().to_lowercase();
        (!s.is_empty()).then_some(s)
    };
    match value {
        Some(Value::String(s)) => s.split(',').filter_map(normalize).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter_map(normalize)
            .collect(),
        _ => Vec::new(),
    }
}
