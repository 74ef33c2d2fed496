//! Configuration types for the watcher.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound applied to the debounce interval.
pub const MIN_DEBOUNCE_MS: u64 = 50;

/// Default debounce interval.
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Configuration for a watcher session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet interval before a batch fires, in milliseconds.
    pub debounce_ms: u64,

    /// Which notification backend to use.
    pub backend: BackendKind,

    /// Poll interval for the polling backend, in milliseconds.
    pub poll_interval_ms: u64,

    /// How long `stop()` waits for the scheduler thread, in milliseconds.
    pub stop_timeout_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            backend: BackendKind::Auto,
            poll_interval_ms: 1000,
            stop_timeout_ms: 5000,
        }
    }
}

impl WatcherConfig {
    /// Create a config with the given debounce interval.
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            ..Self::default()
        }
    }

    /// Force a backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the polling interval.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout_ms(mut self, ms: u64) -> Self {
        self.stop_timeout_ms = ms;
        self
    }

    /// Debounce interval, clamped to [`MIN_DEBOUNCE_MS`].
    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.max(MIN_DEBOUNCE_MS))
    }

    /// How often the scheduler re-checks a pending batch.
    pub fn tick_interval(&self) -> Duration {
        (self.debounce_duration() / 4).clamp(Duration::from_millis(10), Duration::from_millis(250))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Notification backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Native events, or polling when the root sits on a mount with
    /// unreliable native events.
    #[default]
    Auto,

    /// Native OS notifications.
    Native,

    /// Periodic polling.
    Polling,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_debounce_is_clamped() {
        let config = WatcherConfig::new(5);
        assert_eq!(config.debounce_duration(), Duration::from_millis(MIN_DEBOUNCE_MS));
    }

    #[test]
    fn test_tick_interval_bounds() {
        assert_eq!(
            WatcherConfig::new(400).tick_interval(),
            Duration::from_millis(100)
        );
        assert_eq!(
            WatcherConfig::new(10_000).tick_interval(),
            Duration::from_millis(250)
        );
        assert_eq!(
            WatcherConfig::new(50).tick_interval(),
            Duration::from_millis(12) + Duration::from_micros(500)
        );
    }

    #[test]
    fn test_builder() {
        let config = WatcherConfig::new(200)
            .with_backend(BackendKind::Polling)
            .with_poll_interval_ms(100)
            .with_stop_timeout_ms(2000);

        assert_eq!(config.backend, BackendKind::Polling);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.stop_timeout(), Duration::from_secs(2));
    }
}
