//! Retention: cap the event log by dropping the oldest entries.
//!
//! The cap is soft. `track` never checks it; a recurring sweep trims the log
//! back down. The sweep task only holds a weak reference to the log, so it
//! never keeps a dropped log alive.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::event_log::EventLog;
use crate::types::AnalyticsEvent;

/// Drop entries from the front until at most `max` remain. Returns how many
/// were dropped.
pub fn prune(events: &mut Vec<AnalyticsEvent>, max: usize) -> usize {
  if events.len() <= max {
    return 0;
  }
  let excess = events.len() - max;
  events.drain(..excess);
  excess
}

/// Handle to a running sweep. Dropping it stops the sweep.
#[derive(Debug)]
pub struct RetentionTask {
  handle: JoinHandle<()>,
}

impl RetentionTask {
  /// Spawn the sweep on the current tokio runtime. Returns `None` outside a
  /// runtime.
  pub fn spawn(log: Weak<EventLog>, every: Duration) -> Option<Self> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    let handle = runtime.spawn(async move {
      let mut ticker = tokio::time::interval(every);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // First tick completes immediately.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        let Some(log) = log.upgrade() else {
          break;
        };
        log.prune_now();
      }
    });
    Some(Self { handle })
  }

  pub fn is_running(&self) -> bool {
    !self.handle.is_finished()
  }

  pub fn stop(self) {
    self.handle.abort();
  }
}

impl Drop for RetentionTask {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
