//! Folder structure rendering.
//!
//! Produces a markdown-flavoured tree:
//!
//! ```text
//! # Folder Structure
//!
//! 📁 project/
//! │
//! ├── src/
//! │   └── main.rs
//! └── Cargo.toml
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const CONTINUE_INDENT: &str = "│   ";
const CLOSED_INDENT: &str = "    ";

/// Render the structure document for `root`, omitting excluded directories.
///
/// Directories that cannot be listed are skipped silently. Use
/// [`StructureRenderer::with_error_hook`] to observe them.
pub fn render_structure<I, S>(root: &Path, exclude_dir_names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    StructureRenderer::new(exclude_dir_names).render(root)
}

/// Render several roots and join them with a blank line.
pub fn render_structures<I, S>(roots: &[PathBuf], exclude_dir_names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut renderer = StructureRenderer::new(exclude_dir_names);
    roots
        .iter()
        .map(|root| renderer.render(root))
        .collect::<Vec<_>>()
        .join("\n\n")
}

type ErrorHook<'a> = Box<dyn FnMut(&Path, &io::Error) + 'a>;

/// Tree renderer with an optional listing-error hook.
pub struct StructureRenderer<'a> {
    exclude_dirs: BTreeSet<String>,
    on_error: Option<ErrorHook<'a>>,
}

struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
    is_symlink: bool,
}

impl<'a> StructureRenderer<'a> {
    /// Create a renderer that omits the given directory names.
    pub fn new<I, S>(exclude_dir_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_dirs: exclude_dir_names.into_iter().map(Into::into).collect(),
            on_error: None,
        }
    }

    /// Report directories that could not be listed.
    pub fn with_error_hook(mut self, hook: impl FnMut(&Path, &io::Error) + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Render the document for a single root.
    pub fn render(&mut self, root: &Path) -> String {
        let mut lines = vec![
            "# Folder Structure".to_string(),
            String::new(),
            format!("📁 {}/", root_name(root)),
            "│".to_string(),
        ];
        self.walk(root, "", &mut lines);
        lines.join("\n")
    }

    fn walk(&mut self, dir: &Path, prefix: &str, lines: &mut Vec<String>) {
        let entries = match self.list(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping unlistable directory {}: {e}", dir.display());
                if let Some(hook) = self.on_error.as_mut() {
                    hook(dir, &e);
                }
                return;
            }
        };

        let count = entries.len();
        for (i, entry) in entries.into_iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { LAST_BRANCH } else { BRANCH };

            if entry.is_dir {
                lines.push(format!("{prefix}{connector}{}/", entry.name));
                if !entry.is_symlink {
                    let indent = if last { CLOSED_INDENT } else { CONTINUE_INDENT };
                    self.walk(&entry.path, &format!("{prefix}{indent}"), lines);
                }
            } else {
                lines.push(format!("{prefix}{connector}{}", entry.name));
            }
        }
    }

    /// List a directory: excluded directories removed, then directories
    /// first, then case-insensitive name.
    fn list(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry in {}: {e}", dir.display());
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_symlink = entry.file_type().is_ok_and(|t| t.is_symlink());
            let is_dir = path.is_dir();

            if is_dir && self.exclude_dirs.contains(&name) {
                continue;
            }

            entries.push(Entry {
                name,
                path,
                is_dir,
                is_symlink,
            });
        }

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(entries)
    }
}

fn root_name(root: &Path) -> String {
    match root.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => std::path::absolute(root)
            .ok()
            .and_then(|abs| abs.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| root.display().to_string()),
    }
}
