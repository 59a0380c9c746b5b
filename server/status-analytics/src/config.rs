//! Engine configuration with sane defaults.

use std::time::Duration;

/// Tunables for the event log and its derived reports.
#[derive(Debug, Clone)]
pub struct Config {
  /// Soft cap on retained events; enforced by the retention sweep only.
  pub max_events: usize,
  /// How often the retention sweep runs.
  pub retention_interval: Duration,
  /// Sliding window for `status_changes_last_24h`.
  pub stats_window: chrono::Duration,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      max_events: 10_000,
      retention_interval: Duration::from_secs(24 * 60 * 60),
      stats_window: chrono::Duration::hours(24),
    }
  }
}
