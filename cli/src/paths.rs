//! Normalisation of user-supplied path strings.
//!
//! Users paste paths in either Windows or POSIX form. On Unix hosts a Windows
//! drive path is mapped to its WSL mount (`C:\src` becomes `/mnt/c/src`).

use std::path::PathBuf;

/// Normalise `raw` for the current host.
pub fn normalize_input_path(raw: &str) -> String {
    normalize_for_host(raw, cfg!(unix))
}

/// Normalise `raw` for a POSIX (`posix = true`) or Windows host.
///
/// Surrounding whitespace and quotes are removed. POSIX absolute paths pass
/// through. Anything that is neither POSIX absolute nor a Windows drive path
/// is returned as is.
pub fn normalize_for_host(raw: &str, posix: bool) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');

    if trimmed.starts_with('/') {
        return trimmed.to_string();
    }

    let Some((drive, rest)) = split_drive(trimmed) else {
        return trimmed.to_string();
    };

    let rest = rest.replace('\\', "/");
    let rest = rest.trim_start_matches('/');
    if posix {
        format!("/mnt/{}/{rest}", drive.to_ascii_lowercase())
    } else {
        format!("{}:\\{}", drive.to_ascii_uppercase(), rest.replace('/', "\\"))
    }
}

/// Split `C:\rest` or `C:/rest` into the drive letter and the rest.
fn split_drive(path: &str) -> Option<(char, &str)> {
    let mut chars = path.chars();
    let drive = chars.next().filter(char::is_ascii_alphabetic)?;
    let rest = chars.as_str().strip_prefix(':')?;
    let rest = rest.strip_prefix(['\\', '/'])?;
    Some((drive, rest))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match rest.zip(dirs::home_dir()) {
        Some(("", home)) => home,
        Some((rest, home)) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Normalise and expand a user path into something usable on this host.
pub fn resolve_input_path(raw: &str) -> PathBuf {
    expand_home(&normalize_input_path(raw))
}
