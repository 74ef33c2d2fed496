//! Full rebuild of both artifacts.
//!
//! Every call re-scans and re-renders from scratch. There is no incremental
//! update path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts::{ArtifactPaths, WriteMode, write_artifact};
use crate::error::Result;
use crate::filter::FileFilter;
use crate::render::render_codefile;
use crate::selector::{FileCandidate, enumerate, enumerate_explicit};
use crate::structure::{StructureRenderer, render_structures};

/// Result of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileReport {
    /// Number of files rendered into the codefile.
    pub files_written: usize,

    /// Size of the codefile in bytes.
    pub codefile_bytes: usize,

    /// Size of the structure document in bytes (0 if not written).
    pub structure_bytes: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// Rebuilds the codefile and structure document.
#[derive(Debug, Clone)]
pub struct Compiler {
    paths: ArtifactPaths,
    write_mode: WriteMode,
}

impl Compiler {
    /// Create a compiler writing to the given artifact paths.
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            write_mode: WriteMode::default(),
        }
    }

    /// Set how artifacts are written.
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Root mode: walk `root` with `filter`, then write both artifacts.
    pub fn compile_root(&self, root: &Path, filter: &FileFilter) -> Result<CompileReport> {
        let start = Instant::now();

        let files = enumerate(root, filter)?;
        let files = self.without_artifacts(files);
        let codefile = render_codefile(&files);
        let structure = StructureRenderer::new(filter.exclude_dir_names()).render(root);

        self.finish(start, files.len(), &codefile, Some(&structure))
    }

    /// Explicit mode: render a tracked set of files, and the structure of
    /// `structure_roots` (or of the files' parent directories when empty).
    pub fn compile_paths(
        &self,
        files: &[PathBuf],
        structure_roots: &[PathBuf],
        exclude_dir_names: &[String],
        max_bytes: u64,
    ) -> Result<CompileReport> {
        let start = Instant::now();

        let selected = self.without_artifacts(enumerate_explicit(files, max_bytes));
        let codefile = render_codefile(&selected);

        let roots: Vec<PathBuf> = if structure_roots.is_empty() {
            selected
                .iter()
                .filter_map(|f| f.path.parent().map(Path::to_path_buf))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        } else {
            structure_roots.to_vec()
        };

        let structure = if roots.is_empty() {
            None
        } else {
            Some(render_structures(&roots, exclude_dir_names.iter().cloned()))
        };

        self.finish(start, selected.len(), &codefile, structure.as_deref())
    }

    fn without_artifacts(&self, files: Vec<FileCandidate>) -> Vec<FileCandidate> {
        files
            .into_iter()
            .filter(|f| !self.is_artifact(&f.path))
            .collect()
    }

    fn is_artifact(&self, path: &Path) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        let Ok(resolved) = dunce::canonicalize(path) else {
            return false;
        };
        [&self.paths.codefile, &self.paths.structure]
            .iter()
            .any(|artifact| dunce::canonicalize(artifact).is_ok_and(|a| a == resolved))
    }

    fn finish(
        &self,
        start: Instant,
        files_written: usize,
        codefile: &str,
        structure: Option<&str>,
    ) -> Result<CompileReport> {
        write_artifact(&self.paths.codefile, codefile, self.write_mode)?;
        if let Some(structure) = structure {
            write_artifact(&self.paths.structure, structure, self.write_mode)?;
        }

        let report = CompileReport {
            files_written,
            codefile_bytes: codefile.len(),
            structure_bytes: structure.map_or(0, str::len),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Compiled {} files into {} ({} bytes) in {}ms",
            report.files_written,
            self.paths.codefile.display(),
            report.codefile_bytes,
            report.duration_ms
        );

        Ok(report)
    }
}
