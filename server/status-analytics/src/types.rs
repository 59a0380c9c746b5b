//! Core types for the analytics engine (JSON contracts + internal models).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an incident owned by the external incident store.
pub type IncidentId = i64;

/// Free-form caller context attached to an event (changed field, title, ...).
pub type Metadata = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Closed enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventType {
  #[serde(rename = "incident.create")]
  IncidentCreate,
  #[serde(rename = "incident.update")]
  IncidentUpdate,
  #[serde(rename = "incident.status_change")]
  IncidentStatusChange,
  #[serde(rename = "incident.delete")]
  IncidentDelete,
  #[serde(rename = "incident.view")]
  IncidentView,
  #[serde(rename = "admin.login")]
  AdminLogin,
  #[serde(rename = "admin.logout")]
  AdminLogout,
  #[serde(rename = "public.status_view")]
  PublicStatusView,
}

impl EventType {
  pub const ALL: [EventType; 8] = [
    Self::IncidentCreate,
    Self::IncidentUpdate,
    Self::IncidentStatusChange,
    Self::IncidentDelete,
    Self::IncidentView,
    Self::AdminLogin,
    Self::AdminLogout,
    Self::PublicStatusView,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::IncidentCreate => "incident.create",
      Self::IncidentUpdate => "incident.update",
      Self::IncidentStatusChange => "incident.status_change",
      Self::IncidentDelete => "incident.delete",
      Self::IncidentView => "incident.view",
      Self::AdminLogin => "admin.login",
      Self::AdminLogout => "admin.logout",
      Self::PublicStatusView => "public.status_view",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.as_str() == s)
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

impl Severity {
  pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
      Self::Critical => "critical",
    }
  }

  /// Ordinal used by the severity histogram (low=1 .. critical=4).
  pub fn ordinal(self) -> f64 {
    match self {
      Self::Low => 1.0,
      Self::Medium => 2.0,
      Self::High => 3.0,
      Self::Critical => 4.0,
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStatus {
  Investigating,
  Identified,
  Monitoring,
  Resolved,
}

impl IncidentStatus {
  pub const ALL: [IncidentStatus; 4] = [
    Self::Investigating,
    Self::Identified,
    Self::Monitoring,
    Self::Resolved,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Investigating => "investigating",
      Self::Identified => "identified",
      Self::Monitoring => "monitoring",
      Self::Resolved => "resolved",
    }
  }

  /// Reference lifecycle. The event log records whatever it is told; the
  /// incident store uses this to reject bad updates.
  pub fn can_transition_to(self, next: IncidentStatus) -> bool {
    use IncidentStatus::*;
    matches!(
      (self, next),
      (Investigating, Identified | Monitoring | Resolved)
        | (Identified, Monitoring | Resolved)
        | (Monitoring, Resolved)
    )
  }
}

impl fmt::Display for IncidentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Inbound event (what callers hand to `track`)
// ---------------------------------------------------------------------------

/// An event before it is recorded. `timestamp` is filled in by the log when
/// the caller leaves it empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
  pub event_type: EventType,
  pub timestamp: Option<DateTime<Utc>>,
  pub incident_id: Option<IncidentId>,
  pub severity: Option<Severity>,
  pub from_status: Option<IncidentStatus>,
  pub to_status: Option<IncidentStatus>,
  pub admin_id: Option<String>,
  pub metadata: Option<Metadata>,
}

impl NewEvent {
  pub fn new(event_type: EventType) -> Self {
    Self {
      event_type,
      timestamp: None,
      incident_id: None,
      severity: None,
      from_status: None,
      to_status: None,
      admin_id: None,
      metadata: None,
    }
  }

  pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
    self.timestamp = Some(timestamp);
    self
  }

  pub fn incident(mut self, id: IncidentId) -> Self {
    self.incident_id = Some(id);
    self
  }

  pub fn severity(mut self, severity: Severity) -> Self {
    self.severity = Some(severity);
    self
  }

  pub fn transition(mut self, from: Option<IncidentStatus>, to: IncidentStatus) -> Self {
    self.from_status = from;
    self.to_status = Some(to);
    self
  }

  pub fn admin(mut self, admin_id: Option<String>) -> Self {
    self.admin_id = admin_id;
    self
  }

  pub fn metadata(mut self, metadata: Option<Metadata>) -> Self {
    self.metadata = metadata;
    self
  }
}

// ---------------------------------------------------------------------------
// Recorded models
// ---------------------------------------------------------------------------

/// One recorded action in the event log. Never mutated after `track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
  #[serde(rename = "type")]
  pub event_type: EventType,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub incident_id: Option<IncidentId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub severity: Option<Severity>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from_status: Option<IncidentStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub to_status: Option<IncidentStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub admin_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub metadata: Option<Metadata>,
}

impl AnalyticsEvent {
  /// Derived transition, if this is a status change with an incident and target.
  pub fn as_transition(&self) -> Option<StatusTransition> {
    if self.event_type != EventType::IncidentStatusChange {
      return None;
    }
    Some(StatusTransition {
      incident_id: self.incident_id?,
      from_status: self.from_status,
      to_status: self.to_status?,
      timestamp: self.timestamp,
      admin_id: self.admin_id.clone(),
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
  pub incident_id: IncidentId,
  /// `None` for the initial status assignment.
  pub from_status: Option<IncidentStatus>,
  pub to_status: IncidentStatus,
  pub timestamp: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub admin_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract — what report endpoints emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAuditReport {
  pub incident_id: IncidentId,
  pub transitions: Vec<StatusTransition>,
  pub events: Vec<AnalyticsEvent>,
  /// Milliseconds from creation to resolution. Absent when either end was
  /// never tracked; that is not the same as zero.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub total_duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilityStats {
  pub total_events: usize,
  pub total_incidents: usize,
  pub total_transitions: usize,
  pub events_by_type: BTreeMap<EventType, usize>,
  pub status_changes_last_24h: usize,
  /// Mean milliseconds from creation to resolution.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub average_resolution_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentTransitions {
  pub incident_id: IncidentId,
  pub transitions: Vec<StatusTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservabilityExport {
  pub events: Vec<AnalyticsEvent>,
  pub transitions: Vec<IncidentTransitions>,
  pub stats: ObservabilityStats,
}

/// Number of incidents currently in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub investigating: i64,
  pub identified: i64,
  pub monitoring: i64,
  pub resolved: i64,
}

impl StatusCounts {
  pub fn get(&self, status: IncidentStatus) -> i64 {
    match status {
      IncidentStatus::Investigating => self.investigating,
      IncidentStatus::Identified => self.identified,
      IncidentStatus::Monitoring => self.monitoring,
      IncidentStatus::Resolved => self.resolved,
    }
  }

  pub fn increment(&mut self, status: IncidentStatus) {
    match status {
      IncidentStatus::Investigating => self.investigating += 1,
      IncidentStatus::Identified => self.identified += 1,
      IncidentStatus::Monitoring => self.monitoring += 1,
      IncidentStatus::Resolved => self.resolved += 1,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_type_round_trips_through_wire_name() {
    for t in EventType::ALL {
      assert_eq!(EventType::parse(t.as_str()), Some(t));
      let json = serde_json::to_string(&t).unwrap();
      assert_eq!(json, format!("\"{}\"", t.as_str()));
    }
    assert_eq!(EventType::parse("incident.explode"), None);
  }

  #[test]
  fn status_machine_matches_reference_flows() {
    use IncidentStatus::*;
    assert!(Investigating.can_transition_to(Resolved));
    assert!(Identified.can_transition_to(Monitoring));
    assert!(!Monitoring.can_transition_to(Identified));
    assert!(!Resolved.can_transition_to(Investigating));
    assert!(!Investigating.can_transition_to(Investigating));
  }

  #[test]
  fn only_complete_status_changes_derive_transitions() {
    let ts = Utc::now();
    let full = AnalyticsEvent {
      event_type: EventType::IncidentStatusChange,
      timestamp: ts,
      incident_id: Some(7),
      severity: None,
      from_status: None,
      to_status: Some(IncidentStatus::Investigating),
      admin_id: None,
      metadata: None,
    };
    let t = full.as_transition().unwrap();
    assert_eq!(t.incident_id, 7);
    assert_eq!(t.from_status, None);

    let missing_target = AnalyticsEvent { to_status: None, ..full.clone() };
    assert!(missing_target.as_transition().is_none());

    let wrong_type = AnalyticsEvent { event_type: EventType::IncidentUpdate, ..full };
    assert!(wrong_type.as_transition().is_none());
  }

  #[test]
  fn recorded_event_serializes_with_camel_case_and_omits_empty_fields() {
    let ev = AnalyticsEvent {
      event_type: EventType::IncidentCreate,
      timestamp: Utc::now(),
      incident_id: Some(1),
      severity: Some(Severity::High),
      from_status: None,
      to_status: None,
      admin_id: None,
      metadata: None,
    };
    let v = serde_json::to_value(&ev).unwrap();
    assert_eq!(v["type"], "incident.create");
    assert_eq!(v["incidentId"], 1);
    assert_eq!(v["severity"], "high");
    assert!(v.get("fromStatus").is_none());
    assert!(v.get("adminId").is_none());
  }
}
