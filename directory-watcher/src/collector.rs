//! Relevance filtering of raw notifications.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use codemanager_codefile::FileFilter;
use tracing::trace;

use crate::debounce::Debouncer;
use crate::event::FileEventKind;

/// Filters notifications against the session's root and exclusion rules and
/// records the survivors in the debouncer.
#[derive(Debug)]
pub struct EventCollector {
    root: PathBuf,
    filter: FileFilter,
    ignored: Vec<PathBuf>,
    ignored_prefixes: Vec<(PathBuf, String)>,
    debouncer: Arc<Debouncer>,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl EventCollector {
    /// Create a collector for `root`. The root should already be canonical so
    /// that backend paths share its prefix.
    pub fn new(root: impl Into<PathBuf>, filter: FileFilter, debouncer: Arc<Debouncer>) -> Self {
        Self {
            root: root.into(),
            filter,
            ignored: Vec::new(),
            ignored_prefixes: Vec::new(),
            debouncer,
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Never record these exact paths (e.g. the artifacts themselves).
    pub fn ignore_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignored.extend(paths);
        self
    }

    /// Never record files directly inside `dir` whose name starts with
    /// `prefix` (e.g. temporary files of an atomic artifact write).
    pub fn ignore_prefix(mut self, dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        self.ignored_prefixes.push((dir.into(), prefix.into()));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a notification path should trigger a rebuild.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let relative = match path.strip_prefix(&self.root) {
            Ok(relative) if !relative.as_os_str().is_empty() => relative,
            _ => return false,
        };

        if self.filter.has_excluded_segment(relative) {
            return false;
        }

        if self.ignored.iter().any(|p| p == path) || self.has_ignored_prefix(path) {
            return false;
        }

        if path.is_file() && self.filter.is_excluded_file(path) {
            return false;
        }

        true
    }

    fn has_ignored_prefix(&self, path: &Path) -> bool {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        let name = name.to_string_lossy();
        self.ignored_prefixes
            .iter()
            .any(|(dir, prefix)| parent == dir && name.starts_with(prefix.as_str()))
    }

    /// Handle one notification. Returns the number of newly pending paths.
    pub fn on_event(&self, kind: FileEventKind, paths: &[PathBuf], now: Instant) -> usize {
        if !kind.is_change() {
            return 0;
        }

        let mut added = 0;
        for path in paths {
            if self.is_relevant(path) {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                if self.debouncer.record(path.clone(), now) {
                    added += 1;
                }
            } else {
                trace!("Dropping irrelevant event: {}", path.display());
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        added
    }

    /// Events that passed the filter.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Events dropped as irrelevant.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
