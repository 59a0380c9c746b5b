//! Event log: append-only record of incident lifecycle events plus the
//! per-incident status transitions derived from them.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::error::AnalyticsError;
use crate::retention::{self, RetentionTask};
use crate::stats;
use crate::types::*;

/// Downstream consumer notified of every tracked event (structured log line,
/// audit forwarder, ...). Failures and panics are logged and dropped by the
/// event log. Called while the log is write-locked, so a sink must not call
/// back into the log.
pub trait EventSink: Send + Sync {
  fn record(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError>;
}

/// Default sink: one structured `debug` line per event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
  fn record(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
    tracing::debug!(
      event_type = %event.event_type,
      incident_id = ?event.incident_id,
      severity = ?event.severity,
      from_status = ?event.from_status,
      to_status = ?event.to_status,
      admin_id = ?event.admin_id,
      "analytics event tracked"
    );
    Ok(())
  }
}

#[derive(Debug, Default)]
struct LogState {
  events: Vec<AnalyticsEvent>,
  transitions: HashMap<IncidentId, Vec<StatusTransition>>,
}

/// The analytics event log. Share it as `Arc<EventLog>`; all methods take
/// `&self`.
pub struct EventLog {
  config: Config,
  state: RwLock<LogState>,
  sink: Box<dyn EventSink>,
  retention: Mutex<Option<RetentionTask>>,
}

impl std::fmt::Debug for EventLog {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EventLog")
      .field("config", &self.config)
      .field("events", &self.len())
      .finish_non_exhaustive()
  }
}

impl EventLog {
  pub fn new(config: Config) -> Self {
    Self::with_sink(config, TracingSink)
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn with_sink(config: Config, sink: impl EventSink + 'static) -> Self {
    Self {
      config,
      state: RwLock::new(LogState::default()),
      sink: Box::new(sink),
      retention: Mutex::new(None),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  // State is append-only, so a writer that panicked cannot leave it torn.
  fn read(&self) -> RwLockReadGuard<'_, LogState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, LogState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }

  // -------------------------------------------------------------------------
  // Tracking
  // -------------------------------------------------------------------------

  /// Record an event. Never fails: analytics must not abort the operation
  /// that triggered it. Internal errors are logged at `warn`.
  pub fn track(&self, event: NewEvent) {
    let event_type = event.event_type;
    if let Err(e) = self.try_track(event) {
      tracing::warn!(event_type = %event_type, error = %e, "failed to track analytics event");
    }
  }

  fn try_track(&self, event: NewEvent) -> Result<(), AnalyticsError> {
    let event = normalize(event, Utc::now());

    // The sink is notified under the write lock so it sees log order.
    let mut state = self.write();
    if let Some(transition) = event.as_transition() {
      state
        .transitions
        .entry(transition.incident_id)
        .or_default()
        .push(transition);
    }
    state.events.push(event);

    match state.events.last() {
      Some(recorded) => notify(&*self.sink, recorded),
      None => Ok(()),
    }
  }

  pub fn track_incident_create(
    &self,
    incident_id: IncidentId,
    severity: Severity,
    admin_id: Option<&str>,
    metadata: Option<Metadata>,
  ) {
    self.track(
      NewEvent::new(EventType::IncidentCreate)
        .incident(incident_id)
        .severity(severity)
        .admin(admin_id.map(str::to_owned))
        .metadata(metadata),
    );
  }

  pub fn track_incident_update(
    &self,
    incident_id: IncidentId,
    admin_id: Option<&str>,
    metadata: Option<Metadata>,
  ) {
    self.track(
      NewEvent::new(EventType::IncidentUpdate)
        .incident(incident_id)
        .admin(admin_id.map(str::to_owned))
        .metadata(metadata),
    );
  }

  /// `from` is `None` for the initial status assignment.
  pub fn track_incident_status_change(
    &self,
    incident_id: IncidentId,
    from: Option<IncidentStatus>,
    to: IncidentStatus,
    admin_id: Option<&str>,
  ) {
    self.track(
      NewEvent::new(EventType::IncidentStatusChange)
        .incident(incident_id)
        .transition(from, to)
        .admin(admin_id.map(str::to_owned)),
    );
  }

  pub fn track_incident_delete(&self, incident_id: IncidentId, admin_id: Option<&str>) {
    self.track(
      NewEvent::new(EventType::IncidentDelete)
        .incident(incident_id)
        .admin(admin_id.map(str::to_owned)),
    );
  }

  pub fn track_incident_view(&self, incident_id: IncidentId) {
    self.track(NewEvent::new(EventType::IncidentView).incident(incident_id));
  }

  pub fn track_admin_login(&self, admin_id: &str) {
    self.track(NewEvent::new(EventType::AdminLogin).admin(Some(admin_id.to_owned())));
  }

  pub fn track_admin_logout(&self, admin_id: &str) {
    self.track(NewEvent::new(EventType::AdminLogout).admin(Some(admin_id.to_owned())));
  }

  pub fn track_public_status_view(&self) {
    self.track(NewEvent::new(EventType::PublicStatusView));
  }

  // -------------------------------------------------------------------------
  // Queries (linear scans, bounded by the retention cap)
  // -------------------------------------------------------------------------

  pub fn len(&self) -> usize {
    self.read().events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Copy of the whole log in insertion order.
  pub fn events(&self) -> Vec<AnalyticsEvent> {
    self.read().events.clone()
  }

  pub fn events_by_type(&self, event_type: EventType) -> Vec<AnalyticsEvent> {
    self
      .read()
      .events
      .iter()
      .filter(|e| e.event_type == event_type)
      .cloned()
      .collect()
  }

  pub fn incident_events(&self, incident_id: IncidentId) -> Vec<AnalyticsEvent> {
    self
      .read()
      .events
      .iter()
      .filter(|e| e.incident_id == Some(incident_id))
      .cloned()
      .collect()
  }

  pub fn incident_transitions(&self, incident_id: IncidentId) -> Vec<StatusTransition> {
    self
      .read()
      .transitions
      .get(&incident_id)
      .cloned()
      .unwrap_or_default()
  }

  pub fn incident_audit_report(&self, incident_id: IncidentId) -> IncidentAuditReport {
    let state = self.read();
    let transitions = state
      .transitions
      .get(&incident_id)
      .map(Vec::as_slice)
      .unwrap_or_default();
    stats::audit_report(incident_id, &state.events, transitions)
  }

  pub fn observability_stats(&self) -> ObservabilityStats {
    self.observability_stats_at(Utc::now())
  }

  /// Stats with the sliding window anchored at `now` instead of the clock.
  pub fn observability_stats_at(&self, now: DateTime<Utc>) -> ObservabilityStats {
    let state = self.read();
    stats::observability_stats(&state.events, &state.transitions, now, self.config.stats_window)
  }

  /// Full dump for external analysis tooling, taken under one lock.
  pub fn export_observability_data(&self) -> ObservabilityExport {
    let state = self.read();
    ObservabilityExport {
      events: state.events.clone(),
      transitions: stats::group_transitions(&state.transitions),
      stats: stats::observability_stats(
        &state.events,
        &state.transitions,
        Utc::now(),
        self.config.stats_window,
      ),
    }
  }

  // -------------------------------------------------------------------------
  // Lifecycle
  // -------------------------------------------------------------------------

  /// Run one retention sweep now. Returns the number of evicted events.
  /// Transitions are kept.
  pub fn prune_now(&self) -> usize {
    let dropped = retention::prune(&mut self.write().events, self.config.max_events);
    if dropped > 0 {
      tracing::info!(
        dropped,
        max_events = self.config.max_events,
        "analytics retention sweep evicted old events"
      );
    }
    dropped
  }

  /// Start the recurring retention sweep on the current tokio runtime.
  /// Returns `false` (and logs) when no runtime is available.
  pub fn spawn_retention(self: &Arc<Self>) -> bool {
    let mut slot = self.retention.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.as_ref().is_some_and(RetentionTask::is_running) {
      return true;
    }
    match RetentionTask::spawn(Arc::downgrade(self), self.config.retention_interval) {
      Some(task) => {
        *slot = Some(task);
        true
      }
      None => {
        tracing::warn!("no tokio runtime; analytics retention sweep not scheduled");
        false
      }
    }
  }

  pub fn retention_running(&self) -> bool {
    self
      .retention
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .as_ref()
      .is_some_and(RetentionTask::is_running)
  }

  /// Stop the retention sweep. Tracking and queries keep working.
  pub fn close(&self) {
    let task = self.retention.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(task) = task {
      task.stop();
    }
  }

  /// Drop every event and transition.
  pub fn reset(&self) {
    let mut state = self.write();
    state.events.clear();
    state.transitions.clear();
  }
}

/// Turn a caller-supplied event into its recorded form.
fn normalize(event: NewEvent, now: DateTime<Utc>) -> AnalyticsEvent {
  AnalyticsEvent {
    event_type: event.event_type,
    timestamp: event.timestamp.unwrap_or(now),
    incident_id: event.incident_id,
    severity: event.severity,
    from_status: event.from_status,
    to_status: event.to_status,
    admin_id: event.admin_id,
    metadata: event.metadata,
  }
}

/// Hand a recorded event to the sink. A panicking sink is reported like a
/// failing one.
fn notify(sink: &dyn EventSink, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
  panic::catch_unwind(AssertUnwindSafe(|| sink.record(event))).unwrap_or_else(|payload| {
    let reason = payload
      .downcast_ref::<&str>()
      .map(|s| s.to_string())
      .or_else(|| payload.downcast_ref::<String>().cloned())
      .unwrap_or_else(|| "unknown panic".to_string());
    Err(AnalyticsError::sink(format!("panicked: {}", reason)))
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct FailingSink(Arc<AtomicUsize>);

  impl EventSink for FailingSink {
    fn record(&self, _event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
      self.0.fetch_add(1, Ordering::SeqCst);
      Err(AnalyticsError::sink("log pipe closed"))
    }
  }

  struct PanickingSink;

  impl EventSink for PanickingSink {
    fn record(&self, _event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
      panic!("log pipe closed");
    }
  }

  struct RecordingSink(Arc<Mutex<Vec<EventType>>>);

  impl EventSink for RecordingSink {
    fn record(&self, event: &AnalyticsEvent) -> Result<(), AnalyticsError> {
      self.0.lock().unwrap().push(event.event_type);
      Ok(())
    }
  }

  #[test]
  fn events_keep_tracking_order() {
    let log = EventLog::with_defaults();
    log.track_admin_login("ops");
    log.track_incident_create(1, Severity::Low, Some("ops"), None);
    log.track_incident_view(1);
    log.track_public_status_view();

    let types: Vec<_> = log.events().iter().map(|e| e.event_type).collect();
    assert_eq!(
      types,
      vec![
        EventType::AdminLogin,
        EventType::IncidentCreate,
        EventType::IncidentView,
        EventType::PublicStatusView,
      ]
    );
  }

  #[test]
  fn caller_timestamp_is_preserved() {
    let log = EventLog::with_defaults();
    let at = Utc::now() - Duration::days(3);
    log.track(NewEvent::new(EventType::IncidentUpdate).incident(4).at(at));
    assert_eq!(log.events()[0].timestamp, at);
  }

  #[test]
  fn missing_timestamp_is_assigned() {
    let log = EventLog::with_defaults();
    let before = Utc::now();
    log.track_public_status_view();
    let after = Utc::now();
    let ts = log.events()[0].timestamp;
    assert!(ts >= before && ts <= after);
  }

  #[test]
  fn status_change_appends_exactly_one_transition() {
    let log = EventLog::with_defaults();
    log.track_incident_status_change(3, None, IncidentStatus::Investigating, None);
    assert_eq!(log.incident_transitions(3).len(), 1);

    log.track_incident_status_change(
      3,
      Some(IncidentStatus::Investigating),
      IncidentStatus::Identified,
      Some("admin-1"),
    );
    let transitions = log.incident_transitions(3);
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[1].from_status, Some(IncidentStatus::Investigating));
    assert_eq!(transitions[1].to_status, IncidentStatus::Identified);
    assert_eq!(transitions[1].admin_id.as_deref(), Some("admin-1"));
    assert_eq!(log.events_by_type(EventType::IncidentStatusChange).len(), 2);
  }

  #[test]
  fn status_change_without_target_records_event_only() {
    let log = EventLog::with_defaults();
    log.track(NewEvent::new(EventType::IncidentStatusChange).incident(5));
    assert_eq!(log.len(), 1);
    assert!(log.incident_transitions(5).is_empty());
  }

  #[test]
  fn invalid_transitions_are_recorded_as_reported() {
    let log = EventLog::with_defaults();
    log.track_incident_status_change(
      8,
      Some(IncidentStatus::Resolved),
      IncidentStatus::Investigating,
      None,
    );
    assert_eq!(log.incident_transitions(8).len(), 1);
  }

  #[test]
  fn failing_sink_never_loses_events() {
    let calls = Arc::new(AtomicUsize::new(0));
    let log = EventLog::with_sink(Config::default(), FailingSink(calls.clone()));

    log.track_incident_create(1, Severity::High, None, None);
    log.track_incident_status_change(1, None, IncidentStatus::Investigating, None);
    log.track_admin_logout("ops");

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(log.len(), 3);
    assert_eq!(log.incident_transitions(1).len(), 1);
  }

  #[test]
  fn panicking_sink_never_loses_events() {
    let log = EventLog::with_sink(Config::default(), PanickingSink);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      log.track_admin_login("ops");
      log.track_incident_status_change(1, None, IncidentStatus::Investigating, None);
    }));
    assert!(outcome.is_ok());
    assert_eq!(log.len(), 2);
    assert_eq!(log.incident_transitions(1).len(), 1);

    log.track_public_status_view();
    assert_eq!(log.len(), 3);
  }

  #[test]
  fn sink_sees_events_after_they_are_logged() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = EventLog::with_sink(Config::default(), RecordingSink(seen.clone()));
    log.track_admin_login("ops");
    log.track_incident_view(3);

    let logged: Vec<_> = log.events().iter().map(|e| e.event_type).collect();
    assert_eq!(*seen.lock().unwrap(), logged);
  }

  #[test]
  fn incident_events_spans_all_types() {
    let log = EventLog::with_defaults();
    log.track_incident_create(1, Severity::Medium, None, None);
    log.track_incident_create(2, Severity::Medium, None, None);
    log.track_incident_update(1, None, None);
    log.track_incident_delete(1, Some("ops"));

    let events = log.incident_events(1);
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].event_type, EventType::IncidentDelete);
    assert!(log.incident_events(99).is_empty());
  }

  #[test]
  fn prune_now_keeps_newest_and_transitions() {
    let log = EventLog::new(Config {
      max_events: 3,
      ..Config::default()
    });
    for id in 0..5 {
      log.track_incident_status_change(id, None, IncidentStatus::Investigating, None);
    }
    assert_eq!(log.len(), 5);
    assert_eq!(log.prune_now(), 2);

    let ids: Vec<_> = log.events().iter().filter_map(|e| e.incident_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);
    assert_eq!(log.incident_transitions(0).len(), 1);
    assert_eq!(log.observability_stats().total_transitions, 5);
  }

  #[test]
  fn reset_clears_everything() {
    let log = EventLog::with_defaults();
    log.track_incident_status_change(1, None, IncidentStatus::Resolved, None);
    log.reset();
    assert!(log.is_empty());
    assert!(log.incident_transitions(1).is_empty());
  }

  #[test]
  fn retention_needs_a_runtime() {
    let log = Arc::new(EventLog::with_defaults());
    assert!(!log.spawn_retention());
    assert!(!log.retention_running());
  }

  #[tokio::test(start_paused = true)]
  async fn retention_sweep_runs_on_schedule_and_stops_on_close() {
    let log = Arc::new(EventLog::new(Config {
      max_events: 2,
      retention_interval: std::time::Duration::from_secs(60),
      ..Config::default()
    }));
    assert!(log.spawn_retention());
    for _ in 0..5 {
      log.track_public_status_view();
    }

    tokio::time::sleep(std::time::Duration::from_secs(61)).await;
    assert_eq!(log.len(), 2);

    log.close();
    tokio::task::yield_now().await;
    assert!(!log.retention_running());

    for _ in 0..5 {
      log.track_public_status_view();
    }
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;
    assert_eq!(log.len(), 7);
  }
}
