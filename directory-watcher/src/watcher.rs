//! Watcher controller implementation.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use codemanager_codefile::FileFilter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::backend::{
    CrossMountProbe, MountProbe, NotificationBackend, create_backend, select_backend,
};
use crate::collector::EventCollector;
use crate::config::{BackendKind, WatcherConfig};
use crate::debounce::Debouncer;
use crate::error::{Result, WatcherError};
use crate::event::{ChangeBatch, FileEventKind};

/// Receives rebuild failures and other session errors.
pub type ErrorHook = Arc<dyn Fn(&WatcherError) + Send + Sync + 'static>;

/// Result of [`WatcherController::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,

    /// The scheduler thread exited and was joined.
    Stopped,

    /// The scheduler thread did not exit in time. The controller is stopped
    /// anyway and no new batch will be delivered.
    TimedOut,
}

/// Messages for the scheduler thread.
enum Wake {
    Event,
    Shutdown,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Counters {
    fn record_failure(&self, message: String) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message);
    }
}

/// State owned by a running session.
struct Session {
    root: PathBuf,
    backend: Box<dyn NotificationBackend>,
    debouncer: Arc<Debouncer>,
    wake_tx: Sender<Wake>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
    stop_timeout: Duration,
}

/// Owns one watch session at a time: backend, collector, debounce scheduler
/// and the thread that runs the rebuild callback.
pub struct WatcherController {
    probe: Box<dyn MountProbe>,
    error_hook: Option<ErrorHook>,
    ignored: Vec<PathBuf>,
    ignored_prefixes: Vec<(PathBuf, String)>,
    session: Option<Session>,
    collector: Option<Arc<EventCollector>>,
    counters: Arc<Counters>,
    backend: Option<BackendKind>,
}

impl WatcherController {
    /// Create a stopped controller using [`CrossMountProbe`].
    pub fn new() -> Self {
        Self {
            probe: Box::new(CrossMountProbe),
            error_hook: None,
            ignored: Vec::new(),
            ignored_prefixes: Vec::new(),
            session: None,
            collector: None,
            counters: Arc::new(Counters::default()),
            backend: None,
        }
    }

    /// Replace the mount probe used for backend selection.
    pub fn with_probe(mut self, probe: impl MountProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Report rebuild failures to `hook`, from the scheduler thread.
    pub fn with_error_hook(mut self, hook: impl Fn(&WatcherError) + Send + Sync + 'static) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Never treat these paths as changes, typically the output artifacts
    /// when they live under the watched root.
    pub fn with_ignored_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.ignored.extend(paths);
        self
    }

    /// Never treat files directly inside `dir` whose name starts with
    /// `prefix` as changes, typically the temporary files of atomic writes.
    pub fn with_ignored_prefix(
        mut self,
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
    ) -> Self {
        self.ignored_prefixes.push((dir.into(), prefix.into()));
        self
    }

    /// Start watching `root`.
    ///
    /// `on_batch` runs on the scheduler thread, once per settled batch, never
    /// concurrently with itself. Errors and panics it raises are reported
    /// through the error hook and do not end the session.
    ///
    /// Starting while already running is a no-op.
    pub fn start<F>(
        &mut self,
        root: &Path,
        filter: FileFilter,
        config: WatcherConfig,
        on_batch: F,
    ) -> Result<()>
    where
        F: FnMut(&ChangeBatch) -> anyhow::Result<()> + Send + 'static,
    {
        if let Some(session) = &self.session {
            info!(
                "Watcher already running on {}, ignoring start",
                session.root.display()
            );
            return Ok(());
        }

        if !root.exists() {
            return Err(WatcherError::DirectoryNotFound(root.display().to_string()));
        }
        if !root.is_dir() {
            return Err(WatcherError::NotADirectory(root.display().to_string()));
        }
        let root = dunce::canonicalize(root)?;

        let kind = select_backend(&root, config.backend, self.probe.as_ref());
        let debouncer = Arc::new(Debouncer::new(config.debounce_duration()));
        let collector = self.ignored_prefixes.iter().fold(
            EventCollector::new(&root, filter.clone(), Arc::clone(&debouncer))
                .ignore_paths(self.ignored.iter().cloned()),
            |collector, (dir, prefix)| collector.ignore_prefix(dir, prefix),
        );
        let collector = Arc::new(collector);
        let counters = Arc::new(Counters::default());
        let (wake_tx, wake_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handler_collector = Arc::clone(&collector);
        let handler_tx = wake_tx.clone();
        let mut backend = create_backend(
            kind,
            Box::new(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    let added = handler_collector.on_event(
                        FileEventKind::from(event.kind),
                        &event.paths,
                        Instant::now(),
                    );
                    if added > 0 {
                        let _ = handler_tx.send(Wake::Event);
                    }
                }
                Err(e) => warn!("Watch error: {e}"),
            }),
            config.poll_interval(),
        );
        backend.schedule(&root, filter.max_depth() != Some(1));
        backend.start()?;

        let scheduler = Scheduler {
            debouncer: Arc::clone(&debouncer),
            wake_rx,
            counters: Arc::clone(&counters),
            error_hook: self.error_hook.clone(),
            tick: config.tick_interval(),
            _done: done_tx,
        };
        let handle = match std::thread::Builder::new()
            .name("codemanager-debounce".to_string())
            .spawn(move || scheduler.run(on_batch))
        {
            Ok(handle) => handle,
            Err(e) => {
                backend.stop();
                return Err(WatcherError::Spawn(e.to_string()));
            }
        };

        info!(
            "Watching {} ({:?} backend, debounce {:?})",
            root.display(),
            kind,
            debouncer.interval()
        );

        self.collector = Some(collector);
        self.counters = counters;
        self.backend = Some(kind);
        self.session = Some(Session {
            root,
            backend,
            debouncer,
            wake_tx,
            done_rx,
            handle,
            stop_timeout: config.stop_timeout(),
        });
        Ok(())
    }

    /// Stop the session. No batch is delivered after this returns. A rebuild
    /// already in progress is not cancelled.
    pub fn stop(&mut self) -> StopOutcome {
        let Some(mut session) = self.session.take() else {
            debug!("Watcher not running, ignoring stop");
            return StopOutcome::NotRunning;
        };

        session.backend.stop();
        let dropped = session.debouncer.close();
        if dropped > 0 {
            debug!("Discarded {dropped} pending changes on stop");
        }
        let _ = session.wake_tx.send(Wake::Shutdown);

        match session.done_rx.recv_timeout(session.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if session.handle.join().is_err() {
                    error!("Scheduler thread panicked");
                }
                info!("Watcher stopped: {}", session.root.display());
                StopOutcome::Stopped
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Scheduler thread did not exit within {:?}, detaching it",
                    session.stop_timeout
                );
                StopOutcome::TimedOut
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Canonical root of the running session.
    pub fn root(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.root.as_path())
    }

    /// Counters for the current session, or the last one after `stop`.
    pub fn stats(&self) -> WatcherStats {
        let (events_accepted, events_dropped) = self
            .collector
            .as_ref()
            .map_or((0, 0), |c| (c.accepted(), c.dropped()));

        WatcherStats {
            running: self.is_running(),
            backend: self.backend,
            batches_emitted: self.counters.batches.load(Ordering::Relaxed),
            events_accepted,
            events_dropped,
            rebuild_failures: self.counters.failures.load(Ordering::Relaxed),
            last_error: self
                .counters
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

impl Default for WatcherController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WatcherController {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}

/// Statistics about the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WatcherStats {
    /// Whether a session is active.
    pub running: bool,

    /// Backend chosen for the current or last session.
    pub backend: Option<BackendKind>,

    /// Batches handed to the rebuild callback.
    pub batches_emitted: u64,

    /// Event paths that passed the relevance filter.
    pub events_accepted: u64,

    /// Event paths dropped as irrelevant.
    pub events_dropped: u64,

    /// Batches whose callback failed or panicked.
    pub rebuild_failures: u64,

    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// Body of the scheduler thread.
struct Scheduler {
    debouncer: Arc<Debouncer>,
    wake_rx: Receiver<Wake>,
    counters: Arc<Counters>,
    error_hook: Option<ErrorHook>,
    tick: Duration,
    // Dropped when the thread exits, which `stop` waits for.
    _done: Sender<()>,
}

impl Scheduler {
    fn run<F>(self, mut on_batch: F)
    where
        F: FnMut(&ChangeBatch) -> anyhow::Result<()>,
    {
        debug!("Scheduler thread started");
        loop {
            let wait = self
                .debouncer
                .next_deadline(Instant::now())
                .map_or(self.tick, |d| d.min(self.tick))
                .max(Duration::from_millis(1));

            match self.wake_rx.recv_timeout(wait) {
                Ok(Wake::Event) | Err(RecvTimeoutError::Timeout) => {}
                Ok(Wake::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            }

            if let Some(batch) = self.debouncer.poll(Instant::now()) {
                self.deliver(&batch, &mut on_batch);
            }
        }
        debug!("Scheduler thread exiting");
    }

    fn deliver<F>(&self, batch: &ChangeBatch, on_batch: &mut F)
    where
        F: FnMut(&ChangeBatch) -> anyhow::Result<()>,
    {
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        debug!("Delivering batch {} ({} paths)", batch.sequence, batch.len());

        let message = match catch_unwind(AssertUnwindSafe(|| on_batch(batch))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => format!("rebuild panicked: {}", panic_message(payload.as_ref())),
        };

        let err = WatcherError::Rebuild {
            sequence: batch.sequence,
            message: message.clone(),
        };
        error!("{err}");
        self.counters.record_failure(message);
        if let Some(hook) = &self.error_hook {
            hook(&err);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
