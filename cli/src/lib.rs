//! # Codemanager CLI
//!
//! Front end over the codefile compiler and the directory watcher. It keeps
//! a manifest of tracked files and folders and turns it into the two
//! artifacts on demand, or keeps a root's artifacts current in watch mode.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         codemanager                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Settings ──► Manifest ──► TrackedSet ──► Compiler              │
//! │                  ▲                           ▲                  │
//! │                  │                           │                  │
//! │            normalize_input_path      WatcherController          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod commands;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod settings;
pub mod tracked;

pub use commands::{AddOutcome, BackendArg, Cli, Commands};
pub use error::{CliError, Result};
pub use manifest::{DEFAULT_MANIFEST_PATH, MANIFEST_VERSION, Manifest, TrackedFile, TrackedFolder};
pub use paths::{expand_home, normalize_for_host, normalize_input_path, resolve_input_path};
pub use settings::{DEFAULT_FOLDER_EXTS, Settings};
pub use tracked::{TrackedSet, build_tracked_set};
