//! # Codefile
//!
//! File selection and artifact rendering for codemanager.
//!
//! ## Features
//!
//! - **Selection**: Walk a root or resolve an explicit tracked set
//! - **Filtering**: Extensions, excluded directories, path regexes, size and
//!   binary checks
//! - **Rendering**: Concatenated codefile and folder structure document
//! - **Compilation**: Full rebuild of both artifacts on every call
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Compiler                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  FilterConfig ──► FileFilter ──► Selector ──► FileCandidate     │
//! │                                                    │            │
//! │                                                    ▼            │
//! │  StructureRenderer ──────────────────────────► Renderer         │
//! │         │                                          │            │
//! │         └──────────────► ArtifactPaths ◄───────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod artifacts;
pub mod compiler;
pub mod error;
pub mod filter;
pub mod render;
pub mod selector;
pub mod structure;

pub use artifacts::{
    ATOMIC_TEMP_PREFIX, ArtifactPaths, CODEFILE_NAME, STRUCTURE_NAME, WriteMode, write_artifact,
};
pub use compiler::{CompileReport, Compiler};
pub use error::{CodefileError, Result};
pub use filter::{
    DEFAULT_EXCLUDE_DIRS, DEFAULT_MAX_BYTES, FileFilter, FilterConfig, OrderMode,
    normalize_extension, parse_extension_list,
};
pub use render::{header_line, render_codefile};
pub use selector::{FileCandidate, enumerate, enumerate_explicit, looks_binary, sort_candidates};
pub use structure::{StructureRenderer, render_structure, render_structures};
