//! Debounce scheduling of change batches.
//!
//! All state sits behind one mutex: the pending set, the time of the last
//! relevant event and the time of the last emission. The notify thread
//! records paths, the scheduler thread polls. A batch is emitted when it has
//! settled (no new path for a full interval) and at least one interval has
//! passed since the previous emission. A batch that never settles is flushed
//! anyway once its oldest path has waited [`MAX_WAIT_FACTOR`] intervals.
//!
//! Time is passed in by the caller so the rules can be exercised without
//! sleeping.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::event::ChangeBatch;

/// A pending batch is flushed after this many intervals even if events keep
/// arriving.
pub const MAX_WAIT_FACTOR: u32 = 4;

#[derive(Debug, Default)]
struct DebounceState {
    pending: HashSet<PathBuf>,
    first_pending: Option<Instant>,
    last_event: Option<Instant>,
    last_emit: Option<Instant>,
    sequence: u64,
    closed: bool,
}

/// Accumulates changed paths and decides when a batch is ready.
#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    state: Mutex<DebounceState>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(DebounceState::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a changed path. Returns false if it was already pending or the
    /// debouncer is closed.
    pub fn record(&self, path: PathBuf, now: Instant) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.last_event = Some(now);
        if state.pending.is_empty() {
            state.first_pending = Some(now);
        }
        let inserted = state.pending.insert(path);
        if inserted {
            trace!("Pending changes: {}", state.pending.len());
        }
        inserted
    }

    fn max_wait(&self) -> Duration {
        self.interval * MAX_WAIT_FACTOR
    }

    /// Snapshot and clear the pending set if the batch has settled, or has
    /// waited too long to settle.
    pub fn poll(&self, now: Instant) -> Option<ChangeBatch> {
        let mut state = self.lock();
        if state.closed || state.pending.is_empty() {
            return None;
        }

        let settled = state
            .last_event
            .is_none_or(|t| now.saturating_duration_since(t) >= self.interval);
        let overdue = state
            .first_pending
            .is_none_or(|t| now.saturating_duration_since(t) >= self.max_wait());
        let spaced = state
            .last_emit
            .is_none_or(|t| now.saturating_duration_since(t) >= self.interval);
        if !(settled || overdue) || !spaced {
            return None;
        }

        let paths: Vec<PathBuf> = state.pending.drain().collect();
        state.first_pending = None;
        state.last_emit = Some(now);
        state.sequence += 1;
        let batch = ChangeBatch::new(state.sequence, paths);

        debug!("Batch {} settled with {} paths", batch.sequence, batch.len());
        Some(batch)
    }

    /// Time until the pending batch could fire, if anything is pending.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        let state = self.lock();
        if state.closed || state.pending.is_empty() {
            return None;
        }
        let remaining = |since: Option<Instant>, wait: Duration| {
            since.map_or(Duration::ZERO, |t| {
                wait.saturating_sub(now.saturating_duration_since(t))
            })
        };
        let settle = remaining(state.last_event, self.interval)
            .min(remaining(state.first_pending, self.max_wait()));
        Some(settle.max(remaining(state.last_emit, self.interval)))
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Stop accepting paths and drop whatever is pending. After this returns,
    /// `poll` never yields another batch.
    pub fn close(&self) -> usize {
        let mut state = self.lock();
        state.closed = true;
        let dropped = state.pending.len();
        state.pending.clear();
        state.first_pending = None;
        dropped
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INTERVAL: Duration = Duration::from_millis(100);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_burst_collapses_into_one_batch() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        debouncer.record(PathBuf::from("/w/c"), t0);
        assert!(debouncer.poll(t0).is_none());
        debouncer.record(PathBuf::from("/w/a"), t0 + ms(40));
        assert!(debouncer.poll(t0 + ms(60)).is_none());
        debouncer.record(PathBuf::from("/w/b"), t0 + ms(80));
        assert!(debouncer.poll(t0 + ms(150)).is_none());

        let batch = debouncer.poll(t0 + ms(180)).unwrap();
        assert_eq!(
            batch.paths,
            vec![
                PathBuf::from("/w/a"),
                PathBuf::from("/w/b"),
                PathBuf::from("/w/c")
            ]
        );
        assert_eq!(batch.sequence, 1);
        assert!(debouncer.poll(t0 + ms(500)).is_none());
    }

    #[test]
    fn test_spaced_events_fire_separately() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        debouncer.record(PathBuf::from("/w/a"), t0);
        let first = debouncer.poll(t0 + ms(100)).unwrap();

        debouncer.record(PathBuf::from("/w/b"), t0 + ms(250));
        let second = debouncer.poll(t0 + ms(350)).unwrap();

        debouncer.record(PathBuf::from("/w/c"), t0 + ms(500));
        let third = debouncer.poll(t0 + ms(600)).unwrap();

        assert_eq!(first.paths, vec![PathBuf::from("/w/a")]);
        assert_eq!(second.paths, vec![PathBuf::from("/w/b")]);
        assert_eq!(third.paths, vec![PathBuf::from("/w/c")]);
        assert_eq!(third.sequence, 3);
    }

    #[test]
    fn test_duplicates_collapse() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        assert!(debouncer.record(PathBuf::from("/w/a"), t0));
        assert!(!debouncer.record(PathBuf::from("/w/a"), t0 + ms(1)));
        assert_eq!(debouncer.pending_len(), 1);

        let batch = debouncer.poll(t0 + ms(200)).unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_event_during_rebuild_waits_for_next_batch() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        debouncer.record(PathBuf::from("/w/a"), t0);
        let first = debouncer.poll(t0 + ms(100)).unwrap();

        debouncer.record(PathBuf::from("/w/a"), t0 + ms(120));
        assert!(debouncer.poll(t0 + ms(200)).is_none());

        let second = debouncer.poll(t0 + ms(220)).unwrap();
        assert_eq!(first.paths, second.paths);
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn test_next_deadline() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        assert_eq!(debouncer.next_deadline(t0), None);
        debouncer.record(PathBuf::from("/w/a"), t0);
        assert_eq!(debouncer.next_deadline(t0 + ms(30)), Some(ms(70)));
        assert_eq!(debouncer.next_deadline(t0 + ms(300)), Some(Duration::ZERO));
    }

    #[test]
    fn test_steady_stream_is_flushed_after_max_wait() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();
        let mut batches = Vec::new();

        // One event every 50ms never leaves a quiet interval.
        for i in 0..40 {
            let at = t0 + ms(50 * i);
            debouncer.record(PathBuf::from(format!("/w/log{}", i % 3)), at);
            batches.extend(debouncer.poll(at + ms(25)));
        }

        assert_eq!(batches.len(), 4);
        assert_eq!(batches[0].sequence, 1);
        assert_eq!(batches[0].len(), 3);
        assert!(batches.iter().all(|b| !b.is_empty()));
    }

    #[test]
    fn test_next_deadline_honours_max_wait() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        debouncer.record(PathBuf::from("/w/a"), t0);
        debouncer.record(PathBuf::from("/w/b"), t0 + ms(350));

        assert_eq!(debouncer.next_deadline(t0 + ms(360)), Some(ms(40)));
        assert!(debouncer.poll(t0 + ms(399)).is_none());
        assert!(debouncer.poll(t0 + ms(400)).is_some());
    }

    #[test]
    fn test_close_drops_pending_and_blocks_emission() {
        let debouncer = Debouncer::new(INTERVAL);
        let t0 = Instant::now();

        debouncer.record(PathBuf::from("/w/a"), t0);
        assert_eq!(debouncer.close(), 1);
        assert!(debouncer.is_closed());
        assert!(!debouncer.record(PathBuf::from("/w/b"), t0));
        assert!(debouncer.poll(t0 + ms(1000)).is_none());
    }
}
