//! File selection for codefile compilation.
//!
//! Two entry points:
//!
//! - [`enumerate`] walks a root directory and applies the full filter
//!   (excluded directories, extensions, regexes, size, binary probe).
//! - [`enumerate_explicit`] takes already-known paths and only applies the
//!   existence, size and binary checks.
//!
//! Both return a fresh, ordered list on every call. Nothing is cached.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, trace};
use walkdir::WalkDir;

use crate::error::{CodefileError, Result};
use crate::filter::{FileFilter, OrderMode};

/// Number of leading bytes inspected by the binary probe.
pub const BINARY_PROBE_BYTES: usize = 2048;

/// A file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Absolute path to the file.
    pub path: PathBuf,

    /// Size in bytes at selection time.
    pub size: u64,

    /// Last-modified time at selection time (None if unavailable).
    pub modified: Option<SystemTime>,
}

impl FileCandidate {
    /// Stat a path into a candidate.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let metadata = path.metadata()?;

        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            path,
        })
    }

    /// Path key used for case-insensitive ordering.
    fn sort_key(&self) -> String {
        self.path.to_string_lossy().to_lowercase()
    }
}

/// Check whether the first [`BINARY_PROBE_BYTES`] bytes contain a NUL byte.
///
/// This is a heuristic: UTF-16 text is reported as binary and a binary file
/// with a clean prefix slips through.
pub fn looks_binary(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; BINARY_PROBE_BYTES];
    let mut filled = 0;

    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(buf[..filled].contains(&0))
}

/// Walk `root` and return the filtered, ordered file list.
pub fn enumerate(root: &Path, filter: &FileFilter) -> Result<Vec<FileCandidate>> {
    let start = Instant::now();
    let root = absolute_root(root)?;

    let mut walker = WalkDir::new(&root).follow_links(false);
    if let Some(depth) = filter.max_depth() {
        walker = walker.max_depth(depth);
    }

    let mut files = Vec::new();
    let mut skipped = 0usize;

    let entries = walker.into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !filter.is_excluded_dir_name(&entry.file_name().to_string_lossy())
    });

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {e}");
                continue;
            }
        };

        let path = entry.path();
        let is_file = entry.file_type().is_file() || (entry.path_is_symlink() && path.is_file());
        if !is_file {
            continue;
        }

        if !filter.matches_extension(path) || filter.is_excluded_file(path) {
            trace!("Filtered out: {}", path.display());
            skipped += 1;
            continue;
        }

        files.push(path.to_path_buf());
    }

    // Order first, then probe, so a file that vanishes mid-scan still gets a
    // defined position before it is dropped.
    let ordered = order_paths(files, filter.order_mode());
    let mut selected = Vec::with_capacity(ordered.len());
    for path in ordered {
        match accept(&path, filter.max_bytes()) {
            Some(candidate) => selected.push(candidate),
            None => skipped += 1,
        }
    }

    info!(
        "Selected {} files under {} in {:?} ({} skipped)",
        selected.len(),
        root.display(),
        start.elapsed(),
        skipped
    );

    Ok(selected)
}

/// Select from an explicit set of paths.
///
/// Paths are resolved, de-duplicated by their canonical form and sorted
/// case-insensitively. Missing, non-file, oversized and binary entries are
/// dropped.
pub fn enumerate_explicit<I, P>(paths: I, max_bytes: u64) -> Vec<FileCandidate>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut seen = HashSet::new();
    let mut selected = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let resolved = match dunce::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("Dropping unresolvable path {}: {e}", path.display());
                continue;
            }
        };

        if !seen.insert(resolved.clone()) {
            continue;
        }

        if !resolved.is_file() {
            debug!("Dropping non-file path {}", resolved.display());
            continue;
        }

        if let Some(candidate) = accept(&resolved, max_bytes) {
            selected.push(candidate);
        }
    }

    sort_by_path(&mut selected);
    selected
}

/// Sort candidates in place according to `mode`.
pub fn sort_candidates(files: &mut [FileCandidate], mode: OrderMode) {
    match mode {
        OrderMode::ByPath => sort_by_path(files),
        OrderMode::ByModifiedTime => files.sort_by(|a, b| {
            let a_time = a.modified.unwrap_or(UNIX_EPOCH);
            let b_time = b.modified.unwrap_or(UNIX_EPOCH);
            a_time
                .cmp(&b_time)
                .then_with(|| a.sort_key().cmp(&b.sort_key()))
                .then_with(|| a.path.cmp(&b.path))
        }),
    }
}

fn sort_by_path(files: &mut [FileCandidate]) {
    files.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.path.cmp(&b.path))
    });
}

/// Order raw paths, treating a failed stat as timestamp 0.
fn order_paths(paths: Vec<PathBuf>, mode: OrderMode) -> Vec<PathBuf> {
    let mut keyed: Vec<FileCandidate> = paths
        .into_iter()
        .map(|path| {
            let modified = match mode {
                OrderMode::ByModifiedTime => path.metadata().and_then(|m| m.modified()).ok(),
                OrderMode::ByPath => None,
            };
            FileCandidate {
                path,
                size: 0,
                modified,
            }
        })
        .collect();

    sort_candidates(&mut keyed, mode);
    keyed.into_iter().map(|c| c.path).collect()
}

/// Apply the size and binary checks to a single file.
fn accept(path: &Path, max_bytes: u64) -> Option<FileCandidate> {
    let candidate = match FileCandidate::from_path(path) {
        Ok(candidate) => candidate,
        Err(e) => {
            debug!("Cannot stat {}: {e}", path.display());
            return None;
        }
    };

    if candidate.size > max_bytes {
        debug!(
            "Skipping {} ({} bytes exceeds {max_bytes})",
            path.display(),
            candidate.size
        );
        return None;
    }

    match looks_binary(path) {
        Ok(false) => Some(candidate),
        Ok(true) => {
            debug!("Skipping binary file {}", path.display());
            None
        }
        Err(e) => {
            debug!("Cannot read {}: {e}", path.display());
            None
        }
    }
}

fn absolute_root(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        return Err(CodefileError::RootNotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(CodefileError::NotADirectory(root.display().to_string()));
    }
    Ok(std::path::absolute(root)?)
}
