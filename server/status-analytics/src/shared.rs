//! Process-wide shared instances.
//!
//! Prefer constructing `EventLog`/`MetricsRegistry` at the composition root and
//! passing them down. These accessors exist for callers that have no such
//! root: first use builds and caches, later calls return the same `Arc`, and
//! the `reset_*` functions drop the cached instance for test isolation.

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::Config;
use crate::error::AnalyticsError;
use crate::event_log::EventLog;
use crate::metrics::MetricsRegistry;

static EVENT_LOG: Mutex<Option<Arc<EventLog>>> = Mutex::new(None);
static METRICS: Mutex<Option<Arc<MetricsRegistry>>> = Mutex::new(None);

/// Shared event log with default config. Schedules the retention sweep when
/// called inside a tokio runtime.
pub fn event_log() -> Arc<EventLog> {
  let mut slot = EVENT_LOG.lock().unwrap_or_else(PoisonError::into_inner);
  let built = slot.is_none();
  let log = slot
    .get_or_insert_with(|| Arc::new(EventLog::new(Config::default())))
    .clone();
  // Later calls only retry once a runtime can take the task.
  let can_spawn = built || tokio::runtime::Handle::try_current().is_ok();
  if can_spawn && !log.retention_running() {
    log.spawn_retention();
  }
  log
}

/// Stop the shared log's retention sweep and forget it.
pub fn reset_event_log() {
  let log = EVENT_LOG.lock().unwrap_or_else(PoisonError::into_inner).take();
  if let Some(log) = log {
    log.close();
  }
}

pub fn metrics() -> Result<Arc<MetricsRegistry>, AnalyticsError> {
  let mut slot = METRICS.lock().unwrap_or_else(PoisonError::into_inner);
  if let Some(m) = slot.as_ref() {
    return Ok(m.clone());
  }
  let m = Arc::new(MetricsRegistry::new()?);
  *slot = Some(m.clone());
  Ok(m)
}

pub fn reset_metrics() {
  METRICS.lock().unwrap_or_else(PoisonError::into_inner).take();
}
