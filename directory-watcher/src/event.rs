//! File events and emitted change batches.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of file event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileEventKind {
    /// File was created.
    Created,

    /// File was modified.
    Modified,

    /// File was deleted.
    Deleted,

    /// File was renamed (old path).
    RenamedFrom,

    /// File was renamed (new path).
    RenamedTo,

    /// File metadata changed.
    MetadataChanged,

    /// Access time changed.
    Accessed,

    /// Unknown event type.
    Unknown,
}

impl FileEventKind {
    /// Whether this kind can change an artifact.
    ///
    /// Reads never do. `Unknown` is kept since some backends (polling, rescans)
    /// report changes without a precise kind.
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Accessed)
    }
}

impl From<notify::EventKind> for FileEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(modify_kind) => match modify_kind {
                notify::event::ModifyKind::Name(rename) => match rename {
                    notify::event::RenameMode::From => Self::RenamedFrom,
                    notify::event::RenameMode::To => Self::RenamedTo,
                    _ => Self::Modified,
                },
                notify::event::ModifyKind::Metadata(_) => Self::MetadataChanged,
                _ => Self::Modified,
            },
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}

/// A settled batch of changed paths handed to the rebuild callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Monotonic batch number within a session, starting at 1.
    pub sequence: u64,

    /// Changed absolute paths, sorted by path string.
    pub paths: Vec<PathBuf>,

    /// When the batch was emitted.
    pub emitted_at: DateTime<Utc>,
}

impl ChangeBatch {
    /// Create a batch, sorting the paths by their string form.
    pub fn new(sequence: u64, mut paths: Vec<PathBuf>) -> Self {
        paths.sort_by(|a, b| {
            a.to_string_lossy()
                .cmp(&b.to_string_lossy())
                .then_with(|| a.cmp(b))
        });
        Self {
            sequence,
            paths,
            emitted_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
