//! Resolution of the manifest into concrete files.

use std::path::PathBuf;

use codemanager_codefile::{FilterConfig, enumerate, enumerate_explicit};
use tracing::{debug, warn};

use crate::manifest::Manifest;
use crate::paths::resolve_input_path;
use crate::settings::Settings;

/// Files and structure roots resolved from a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedSet {
    /// Union of explicit files and folder contents, de-duplicated by
    /// canonical path and sorted case-insensitively.
    pub files: Vec<PathBuf>,

    /// Tracked folders that currently exist.
    pub structure_roots: Vec<PathBuf>,
}

impl TrackedSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Resolve every manifest entry against the filesystem.
///
/// Explicit files that no longer exist and folders that cannot be scanned are
/// skipped with a warning.
pub fn build_tracked_set(manifest: &Manifest, settings: &Settings) -> TrackedSet {
    let mut candidates: Vec<PathBuf> = manifest
        .files
        .iter()
        .filter_map(|f| {
            let path = resolve_input_path(&f.path);
            if path.is_file() {
                Some(path)
            } else {
                warn!("Tracked file missing: {}", f.path);
                None
            }
        })
        .collect();

    let mut structure_roots = Vec::new();
    for folder in &manifest.folders {
        let root = resolve_input_path(&folder.path);
        let mut config = FilterConfig::new()
            .with_extensions(folder.exts.iter().map(String::as_str))
            .with_exclude_dirs(settings.exclude_dirs.iter().map(String::as_str))
            .with_max_bytes(settings.max_bytes);
        if !folder.recursive {
            config = config.non_recursive();
        }

        let scanned = config.compile().and_then(|filter| enumerate(&root, &filter));
        match scanned {
            Ok(files) => {
                debug!("Folder {} contributed {} files", folder.path, files.len());
                candidates.extend(files.into_iter().map(|f| f.path));
                structure_roots.push(root);
            }
            Err(e) => warn!("Skipping tracked folder {}: {e}", folder.path),
        }
    }

    let files = enumerate_explicit(&candidates, settings.max_bytes)
        .into_iter()
        .map(|f| f.path)
        .collect();

    TrackedSet {
        files,
        structure_roots,
    }
}
