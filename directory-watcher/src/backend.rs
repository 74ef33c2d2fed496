//! Notification backends.
//!
//! Two implementations wrap notify: [`NativeBackend`] for OS events and
//! [`PollingBackend`] for periodic scans. [`select_backend`] picks one at
//! start time using a [`MountProbe`], and [`create_backend`] builds it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info};

use crate::config::BackendKind;
use crate::error::{Result, WatcherError};

/// Callback invoked by the backend thread for every raw notification.
pub type EventHandler = Box<dyn FnMut(notify::Result<notify::Event>) + Send + 'static>;

/// A source of filesystem notifications.
pub trait NotificationBackend: Send {
    /// The resolved backend kind (never `Auto`).
    fn kind(&self) -> BackendKind;

    /// Register a root to watch once started.
    fn schedule(&mut self, root: &Path, recursive: bool);

    /// Begin delivering notifications.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering notifications. Idempotent.
    fn stop(&mut self);
}

/// Decides whether native events are trustworthy for a root.
pub trait MountProbe: Send + Sync {
    /// True when the root sits on a filesystem whose native events are known
    /// to be unreliable.
    fn has_unreliable_events(&self, root: &Path) -> bool;
}

impl<F> MountProbe for F
where
    F: Fn(&Path) -> bool + Send + Sync,
{
    fn has_unreliable_events(&self, root: &Path) -> bool {
        self(root)
    }
}

/// Flags Windows drives mounted into WSL (`/mnt/c/...`), where inotify
/// does not see changes made from the Windows side.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossMountProbe;

impl MountProbe for CrossMountProbe {
    fn has_unreliable_events(&self, root: &Path) -> bool {
        root.starts_with("/mnt/")
    }
}

/// Resolve `requested` into a concrete backend kind for `root`.
pub fn select_backend(root: &Path, requested: BackendKind, probe: &dyn MountProbe) -> BackendKind {
    match requested {
        BackendKind::Auto if probe.has_unreliable_events(root) => {
            info!(
                "Root {} is on a cross-filesystem mount, using polling",
                root.display()
            );
            BackendKind::Polling
        }
        BackendKind::Auto => BackendKind::Native,
        kind => kind,
    }
}

/// Build a backend of the given kind.
pub fn create_backend(
    kind: BackendKind,
    handler: EventHandler,
    poll_interval: Duration,
) -> Box<dyn NotificationBackend> {
    match kind {
        BackendKind::Polling => Box::new(PollingBackend::polling(handler, poll_interval)),
        BackendKind::Native | BackendKind::Auto => Box::new(NativeBackend::native(handler)),
    }
}

/// notify-backed implementation shared by both backends.
pub struct NotifyBackend<W: Watcher> {
    kind: BackendKind,
    config: notify::Config,
    handler: Option<EventHandler>,
    scheduled: Vec<(PathBuf, RecursiveMode)>,
    watcher: Option<W>,
}

/// Native OS notifications.
pub type NativeBackend = NotifyBackend<RecommendedWatcher>;

/// Periodic polling.
pub type PollingBackend = NotifyBackend<PollWatcher>;

impl NativeBackend {
    pub fn native(handler: EventHandler) -> Self {
        Self::with_config(BackendKind::Native, handler, notify::Config::default())
    }
}

impl PollingBackend {
    pub fn polling(handler: EventHandler, interval: Duration) -> Self {
        let config = notify::Config::default()
            .with_poll_interval(interval)
            .with_compare_contents(false);
        Self::with_config(BackendKind::Polling, handler, config)
    }
}

impl<W: Watcher> NotifyBackend<W> {
    fn with_config(kind: BackendKind, handler: EventHandler, config: notify::Config) -> Self {
        Self {
            kind,
            config,
            handler: Some(handler),
            scheduled: Vec::new(),
            watcher: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.watcher.is_some()
    }
}

impl<W: Watcher + Send> NotificationBackend for NotifyBackend<W> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn schedule(&mut self, root: &Path, recursive: bool) {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.scheduled.push((root.to_path_buf(), mode));
    }

    fn start(&mut self) -> Result<()> {
        let handler = self
            .handler
            .take()
            .ok_or_else(|| WatcherError::Backend("backend can only be started once".to_string()))?;

        let mut watcher = W::new(handler, self.config)?;
        for (root, mode) in &self.scheduled {
            watcher.watch(root, *mode)?;
            debug!("Started watching: {}", root.display());
        }

        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            for (root, _) in &self.scheduled {
                if let Err(e) = watcher.unwatch(root) {
                    debug!("Failed to unwatch {}: {e}", root.display());
                }
            }
            debug!("{:?} backend stopped", self.kind);
        }
    }
}
