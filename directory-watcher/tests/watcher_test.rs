//! Integration tests for the watcher controller against real backends.
//!
//! Timeouts are generous; only ordering and content are asserted.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use codemanager_codefile::FilterConfig;
use codemanager_directory_watcher::{
    BackendKind, ChangeBatch, StopOutcome, WatcherConfig, WatcherController,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);
const QUIET: Duration = Duration::from_millis(1500);

fn canonical_root(temp_dir: &TempDir) -> PathBuf {
    dunce::canonicalize(temp_dir.path()).unwrap()
}

/// Start a controller that forwards every batch to a channel.
fn start(root: &Path, config: WatcherConfig) -> (WatcherController, Receiver<ChangeBatch>) {
    let (tx, rx) = mpsc::channel();
    let mut controller = WatcherController::new();
    controller
        .start(
            root,
            FilterConfig::new().compile().unwrap(),
            config,
            move |batch| {
                tx.send(batch.clone())?;
                Ok(())
            },
        )
        .unwrap();

    // Give the backend a moment to register its watches.
    thread::sleep(Duration::from_millis(200));
    (controller, rx)
}

#[test]
fn test_burst_collapses_into_one_batch() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let (mut controller, rx) = start(&root, WatcherConfig::new(300));

    for name in ["c.rs", "a.rs", "b.rs"] {
        fs::write(root.join(name), name).unwrap();
    }

    let batch = rx.recv_timeout(WAIT).unwrap();
    for name in ["a.rs", "b.rs", "c.rs"] {
        assert!(
            batch.paths.contains(&root.join(name)),
            "missing {name} in {:?}",
            batch.paths
        );
    }
    let mut sorted = batch.paths.clone();
    sorted.sort();
    assert_eq!(batch.paths, sorted);
    assert_eq!(batch.sequence, 1);

    assert_eq!(controller.stop(), StopOutcome::Stopped);
}

#[test]
fn test_excluded_directories_never_trigger() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    fs::create_dir_all(root.join(".git/refs")).unwrap();
    let (mut controller, rx) = start(&root, WatcherConfig::new(100));

    fs::write(root.join(".git/refs/HEAD"), "ref").unwrap();
    assert!(rx.recv_timeout(QUIET).is_err());

    fs::write(root.join("main.rs"), "fn main() {}").unwrap();
    let batch = rx.recv_timeout(WAIT).unwrap();
    assert!(batch.paths.contains(&root.join("main.rs")));
    assert!(batch.paths.iter().all(|p| !p.starts_with(root.join(".git"))));

    controller.stop();
    assert!(controller.stats().events_dropped > 0);
}

#[test]
fn test_failed_rebuild_does_not_block_later_rebuild() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let (tx, rx) = mpsc::channel();
    let reported = Arc::new(Mutex::new(Vec::new()));
    let hook_reported = Arc::clone(&reported);

    let mut controller = WatcherController::new().with_error_hook(move |e| {
        hook_reported.lock().unwrap().push(e.to_string());
    });
    controller
        .start(
            &root,
            FilterConfig::new().compile().unwrap(),
            WatcherConfig::new(100),
            move |batch| {
                tx.send(batch.sequence)?;
                if batch.sequence == 1 {
                    anyhow::bail!("rebuild exploded");
                }
                Ok(())
            },
        )
        .unwrap();
    thread::sleep(Duration::from_millis(200));

    fs::write(root.join("first.rs"), "1").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);

    thread::sleep(Duration::from_millis(300));
    fs::write(root.join("second.rs"), "2").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 2);

    assert_eq!(controller.stop(), StopOutcome::Stopped);
    let stats = controller.stats();
    assert_eq!(stats.rebuild_failures, 1);
    assert!(stats.batches_emitted >= 2);
    assert!(stats.last_error.unwrap().contains("rebuild exploded"));
    assert_eq!(reported.lock().unwrap().len(), 1);
}

#[test]
fn test_no_batches_after_stop() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let (mut controller, rx) = start(&root, WatcherConfig::new(100));

    fs::write(root.join("pending.rs"), "x").unwrap();
    assert_eq!(controller.stop(), StopOutcome::Stopped);
    assert!(!controller.is_running());

    // Anything pending at stop time is discarded, later changes are unseen.
    while rx.try_recv().is_ok() {}
    fs::write(root.join("after.rs"), "y").unwrap();
    assert!(rx.recv_timeout(QUIET).is_err());
}

#[test]
fn test_polling_backend_detects_changes() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let config = WatcherConfig::new(100)
        .with_backend(BackendKind::Polling)
        .with_poll_interval_ms(100);
    let (mut controller, rx) = start(&root, config);
    assert_eq!(controller.stats().backend, Some(BackendKind::Polling));

    fs::create_dir(root.join("src")).unwrap();
    fs::write(root.join("src/lib.rs"), "pub fn f() {}").unwrap();

    let mut seen = Vec::new();
    while !seen.contains(&root.join("src/lib.rs")) {
        let batch = rx.recv_timeout(WAIT).unwrap();
        seen.extend(batch.paths);
    }

    controller.stop();
}

#[test]
fn test_restart_after_stop() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let (mut controller, _rx) = start(&root, WatcherConfig::new(100));
    assert_eq!(controller.stop(), StopOutcome::Stopped);

    let (tx, rx) = mpsc::channel();
    controller
        .start(
            &root,
            FilterConfig::new().compile().unwrap(),
            WatcherConfig::new(100),
            move |batch| {
                tx.send(batch.sequence)?;
                Ok(())
            },
        )
        .unwrap();
    thread::sleep(Duration::from_millis(200));

    fs::write(root.join("again.rs"), "z").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);
    controller.stop();
}

#[test]
fn test_stop_times_out_on_slow_rebuild_and_delivers_nothing_more() {
    let temp_dir = TempDir::new().unwrap();
    let root = canonical_root(&temp_dir);
    let (tx, rx) = mpsc::channel();

    let mut controller = WatcherController::new();
    controller
        .start(
            &root,
            FilterConfig::new().compile().unwrap(),
            WatcherConfig::new(100).with_stop_timeout_ms(300),
            move |batch| {
                tx.send(batch.sequence)?;
                thread::sleep(Duration::from_secs(2));
                Ok(())
            },
        )
        .unwrap();
    thread::sleep(Duration::from_millis(200));

    fs::write(root.join("slow.rs"), "1").unwrap();
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), 1);

    // Queued behind the rebuild that is still running.
    fs::write(root.join("queued.rs"), "2").unwrap();
    thread::sleep(Duration::from_millis(300));

    assert_eq!(controller.stop(), StopOutcome::TimedOut);
    assert!(!controller.is_running());
    assert!(!controller.stats().running);

    // The slow rebuild finishes, then the scheduler exits without a new batch.
    assert!(rx.recv_timeout(Duration::from_secs(4)).is_err());
}
