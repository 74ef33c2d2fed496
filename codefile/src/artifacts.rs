//! Artifact output paths and writing.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodefileError, Result};

/// File name of the concatenated codefile.
pub const CODEFILE_NAME: &str = "CODEFILE.txt";

/// File name of the structure document.
pub const STRUCTURE_NAME: &str = "StructureLatest.md";

/// Prefix of the temporary files created by [`WriteMode::Atomic`].
pub const ATOMIC_TEMP_PREFIX: &str = ".codemanager-";

/// How artifacts are written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate and overwrite in place. Readers polling the file during a
    /// rebuild may observe a partial document.
    #[default]
    Overwrite,

    /// Write to a temporary file in the same directory and rename it over
    /// the target. Temporary files are named with [`ATOMIC_TEMP_PREFIX`].
    Atomic,
}

/// Locations of the two generated artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    /// Concatenated codefile.
    pub codefile: PathBuf,

    /// Structure document.
    pub structure: PathBuf,
}

impl ArtifactPaths {
    /// Standard artifact names inside `output_dir`.
    pub fn in_dir(output_dir: impl AsRef<Path>) -> Self {
        let output_dir = output_dir.as_ref();
        Self {
            codefile: output_dir.join(CODEFILE_NAME),
            structure: output_dir.join(STRUCTURE_NAME),
        }
    }

    /// Directory the artifacts are written to.
    pub fn output_dir(&self) -> &Path {
        self.codefile
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Whether `path` is one of the artifacts.
    ///
    /// The watcher uses this to ignore its own writes when the output
    /// directory sits inside the watched root.
    pub fn contains(&self, path: &Path) -> bool {
        path == self.codefile || path == self.structure
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, contents: &str, mode: WriteMode) -> Result<()> {
    let wrap = |source: std::io::Error| CodefileError::WriteArtifact {
        path: path.display().to_string(),
        source,
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(wrap)?;

    match mode {
        WriteMode::Overwrite => std::fs::write(path, contents).map_err(wrap)?,
        WriteMode::Atomic => {
            let mut tmp = tempfile::Builder::new()
                .prefix(ATOMIC_TEMP_PREFIX)
                .tempfile_in(parent)
                .map_err(wrap)?;
            tmp.write_all(contents.as_bytes()).map_err(wrap)?;
            tmp.as_file().sync_all().map_err(wrap)?;
            tmp.persist(path).map_err(|e| wrap(e.error))?;
        }
    }

    debug!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(())
}
