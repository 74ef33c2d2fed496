//! # Directory Watcher
//!
//! Change-driven recompilation for codemanager. It watches a root and hands
//! settled batches of changed paths to a rebuild callback.
//!
//! ## Features
//!
//! - **Backends**: Native OS events, or polling on mounts where native
//!   events are unreliable
//! - **Relevance Filtering**: Excluded directories and file patterns never
//!   trigger a rebuild
//! - **Debouncing**: Bursts of changes collapse into one batch
//! - **Isolation**: A failing rebuild is reported and the session continues
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Watcher Controller                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  MountProbe ──► NotificationBackend ──► EventCollector          │
//! │                  (native | polling)           │                 │
//! │                                               ▼                 │
//! │  on_batch ◄──── scheduler thread ◄──── Debouncer                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod collector;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod watcher;

pub use backend::{
    CrossMountProbe, MountProbe, NativeBackend, NotificationBackend, PollingBackend,
    create_backend, select_backend,
};
pub use collector::EventCollector;
pub use config::{BackendKind, DEFAULT_DEBOUNCE_MS, MIN_DEBOUNCE_MS, WatcherConfig};
pub use debounce::{Debouncer, MAX_WAIT_FACTOR};
pub use error::{Result, WatcherError};
pub use event::{ChangeBatch, FileEventKind};
pub use watcher::{ErrorHook, StopOutcome, WatcherController, WatcherStats};
