//! In-memory incident store.
//!
//! Not durable. It exists to drive the analytics engine the way a real store
//! would: every operation runs under an `OperationTimer`, records its table
//! latency, and reports lifecycle events after the mutation succeeds.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use status_analytics::types::Metadata;
use status_analytics::{
  DbOperation, EventLog, IncidentId, IncidentStatus, MetricsRegistry, Operation,
  OperationStatus, OperationTimer, Severity, StatusCounts,
};

use crate::error::ServiceError;

const TABLE: &str = "incidents";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
  pub id: IncidentId,
  pub title: String,
  pub description: String,
  pub severity: Severity,
  pub status: IncidentStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncident {
  pub title: String,
  #[serde(default)]
  pub description: String,
  pub severity: Severity,
  #[serde(default)]
  pub status: Option<IncidentStatus>,
  #[serde(default)]
  pub admin_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIncident {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub severity: Option<Severity>,
  #[serde(default)]
  pub admin_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
  pub total: usize,
  pub active: usize,
  pub by_status: StatusCounts,
  pub by_severity: BTreeMap<Severity, usize>,
}

#[derive(Debug)]
pub struct IncidentStore {
  incidents: RwLock<BTreeMap<IncidentId, Incident>>,
  next_id: RwLock<IncidentId>,
  analytics: Arc<EventLog>,
  metrics: Arc<MetricsRegistry>,
}

impl IncidentStore {
  pub fn new(analytics: Arc<EventLog>, metrics: Arc<MetricsRegistry>) -> Self {
    Self {
      incidents: RwLock::new(BTreeMap::new()),
      next_id: RwLock::new(1),
      analytics,
      metrics,
    }
  }

  fn read(&self) -> RwLockReadGuard<'_, BTreeMap<IncidentId, Incident>> {
    self.incidents.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<IncidentId, Incident>> {
    self.incidents.write().unwrap_or_else(PoisonError::into_inner)
  }

  fn record_db(&self, op: DbOperation, started: Instant) {
    self
      .metrics
      .record_database_latency(op, TABLE, started.elapsed().as_secs_f64());
  }

  pub fn create(&self, input: CreateIncident) -> Result<Incident, ServiceError> {
    let timer = OperationTimer::start(&self.metrics, Operation::Create);

    let title = input.title.trim();
    if title.is_empty() {
      return Err(ServiceError::validation("title", "must not be empty"));
    }
    let status = input.status.unwrap_or(IncidentStatus::Investigating);
    let now = Utc::now();

    let started = Instant::now();
    let incident = {
      let mut next_id = self.next_id.write().unwrap_or_else(PoisonError::into_inner);
      let incident = Incident {
        id: *next_id,
        title: title.to_string(),
        description: input.description,
        severity: input.severity,
        status,
        created_at: now,
        updated_at: now,
        resolved_at: (status == IncidentStatus::Resolved).then_some(now),
      };
      *next_id += 1;
      self.write().insert(incident.id, incident.clone());
      incident
    };
    self.record_db(DbOperation::Insert, started);

    let admin = input.admin_id.as_deref();
    let mut meta = Metadata::new();
    meta.insert("title".into(), serde_json::Value::from(incident.title.clone()));
    self
      .analytics
      .track_incident_create(incident.id, incident.severity, admin, Some(meta));
    self
      .analytics
      .track_incident_status_change(incident.id, None, status, admin);
    self.metrics.record_incident_severity(incident.severity);
    self.refresh_gauges();

    tracing::info!(incident_id = incident.id, severity = %incident.severity, "incident created");
    timer.end(OperationStatus::Success);
    Ok(incident)
  }

  /// Read for display; counts as a view.
  pub fn get(&self, id: IncidentId) -> Result<Incident, ServiceError> {
    let timer = OperationTimer::start(&self.metrics, Operation::Get);
    let started = Instant::now();
    let found = self.read().get(&id).cloned();
    self.record_db(DbOperation::Select, started);

    let incident = found.ok_or(ServiceError::NotFound(id))?;
    self.analytics.track_incident_view(id);
    timer.end(OperationStatus::Success);
    Ok(incident)
  }

  /// All incidents, newest first.
  pub fn list(&self) -> Vec<Incident> {
    let timer = OperationTimer::start(&self.metrics, Operation::List);
    let started = Instant::now();
    let mut incidents: Vec<Incident> = self.read().values().cloned().collect();
    self.record_db(DbOperation::Select, started);
    incidents.reverse();
    timer.end(OperationStatus::Success);
    incidents
  }

  pub fn update(&self, id: IncidentId, patch: UpdateIncident) -> Result<Incident, ServiceError> {
    let timer = OperationTimer::start(&self.metrics, Operation::Update);

    if let Some(title) = &patch.title {
      if title.trim().is_empty() {
        return Err(ServiceError::validation("title", "must not be empty"));
      }
    }

    let started = Instant::now();
    let (incident, changed) = {
      let mut incidents = self.write();
      let incident = incidents.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
      let mut changed: Vec<&'static str> = Vec::new();
      if let Some(title) = patch.title {
        incident.title = title.trim().to_string();
        changed.push("title");
      }
      if let Some(description) = patch.description {
        incident.description = description;
        changed.push("description");
      }
      if let Some(severity) = patch.severity {
        incident.severity = severity;
        changed.push("severity");
      }
      incident.updated_at = Utc::now();
      (incident.clone(), changed)
    };
    self.record_db(DbOperation::Update, started);

    let mut meta = Metadata::new();
    meta.insert("fields".into(), serde_json::json!(changed));
    self
      .analytics
      .track_incident_update(id, patch.admin_id.as_deref(), Some(meta));

    timer.end(OperationStatus::Success);
    Ok(incident)
  }

  /// Move an incident along its lifecycle. Rejects moves the lifecycle does
  /// not allow, including staying put.
  pub fn update_status(
    &self,
    id: IncidentId,
    status: IncidentStatus,
    admin_id: Option<&str>,
  ) -> Result<Incident, ServiceError> {
    let timer = OperationTimer::start(&self.metrics, Operation::StatusChange);

    let started = Instant::now();
    let (incident, from) = {
      let mut incidents = self.write();
      let incident = incidents.get_mut(&id).ok_or(ServiceError::NotFound(id))?;
      let from = incident.status;
      if !from.can_transition_to(status) {
        return Err(ServiceError::InvalidTransition { from, to: status });
      }
      let now = Utc::now();
      incident.status = status;
      incident.updated_at = now;
      if status == IncidentStatus::Resolved {
        incident.resolved_at = Some(now);
      }
      (incident.clone(), from)
    };
    self.record_db(DbOperation::Update, started);

    self
      .analytics
      .track_incident_status_change(id, Some(from), status, admin_id);
    self.refresh_gauges();

    tracing::info!(incident_id = id, from = %from, to = %status, "incident status changed");
    timer.end(OperationStatus::Success);
    Ok(incident)
  }

  pub fn delete(&self, id: IncidentId, admin_id: Option<&str>) -> Result<(), ServiceError> {
    let timer = OperationTimer::start(&self.metrics, Operation::Delete);
    let started = Instant::now();
    let removed = self.write().remove(&id);
    self.record_db(DbOperation::Delete, started);

    removed.ok_or(ServiceError::NotFound(id))?;
    self.analytics.track_incident_delete(id, admin_id);
    self.refresh_gauges();
    timer.end(OperationStatus::Success);
    Ok(())
  }

  pub fn stats(&self) -> StoreStats {
    let timer = OperationTimer::start(&self.metrics, Operation::Stats);
    let started = Instant::now();
    let stats = summarize(&self.read());
    self.record_db(DbOperation::Select, started);
    timer.end(OperationStatus::Success);
    stats
  }

  /// Drop every incident. Status gauges go back to zero with them.
  pub fn clear(&self) -> usize {
    let timer = OperationTimer::start(&self.metrics, Operation::Clear);
    let started = Instant::now();
    let removed = {
      let mut incidents = self.write();
      let n = incidents.len();
      incidents.clear();
      n
    };
    self.record_db(DbOperation::Delete, started);

    self.metrics.reset_incident_status_counts_gauge();
    self.metrics.update_active_incidents_gauge(0);
    tracing::info!(removed, "incident store cleared");
    timer.end(OperationStatus::Success);
    removed
  }

  /// Incidents not yet resolved, for the public status page.
  pub fn active(&self) -> Vec<Incident> {
    self
      .read()
      .values()
      .filter(|i| i.status != IncidentStatus::Resolved)
      .cloned()
      .collect()
  }

  fn refresh_gauges(&self) {
    let stats = summarize(&self.read());
    self.metrics.update_active_incidents_gauge(stats.active as i64);
    self.metrics.update_incident_status_counts_gauge(&stats.by_status);
  }
}

fn summarize(incidents: &BTreeMap<IncidentId, Incident>) -> StoreStats {
  let mut by_status = StatusCounts::default();
  let mut by_severity = BTreeMap::new();
  for incident in incidents.values() {
    by_status.increment(incident.status);
    *by_severity.entry(incident.severity).or_insert(0) += 1;
  }
  StoreStats {
    total: incidents.len(),
    active: incidents.len() - by_status.resolved as usize,
    by_status,
    by_severity,
  }
}
