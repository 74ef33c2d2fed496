//! Codefile rendering.

use std::path::Path;

use tracing::warn;

use crate::selector::FileCandidate;

/// Header line that precedes every file in the codefile.
pub fn header_line(path: &Path) -> String {
    format!(
        "<<<<<<<<<<<<<<<<<<    {}     >>>>>>>>>>>>>>>>>>>>",
        path.display()
    )
}

/// Placeholder emitted when a selected file cannot be read.
pub fn error_line(path: &Path, error: &std::io::Error) -> String {
    format!("<<ERROR READING {}: {error}>>", path.display())
}

/// Render the concatenated codefile for `files`, in the given order.
///
/// Contents are decoded as UTF-8 with invalid sequences replaced. A file that
/// fails to read gets an inline error marker instead of its contents.
pub fn render_codefile(files: &[FileCandidate]) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(files.len() * 4);

    for file in files {
        lines.push(String::new());
        lines.push(header_line(&file.path));
        lines.push(String::new());

        match std::fs::read(&file.path) {
            Ok(bytes) => lines.push(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!("Failed to read {}: {e}", file.path.display());
                lines.push(error_line(&file.path, &e));
            }
        }
    }

    lines.join("\n").trim_start().to_string()
}
