//! Derived views over the event log: per-incident audit reports and aggregate
//! observability stats. Pure functions over snapshots; the log hands them
//! borrowed state under its read lock.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::*;

/// First `incident.create` event for each incident, keyed by id.
fn creation_times(events: &[AnalyticsEvent]) -> HashMap<IncidentId, DateTime<Utc>> {
  let mut created = HashMap::new();
  for ev in events {
    if ev.event_type != EventType::IncidentCreate {
      continue;
    }
    if let Some(id) = ev.incident_id {
      created.entry(id).or_insert(ev.timestamp);
    }
  }
  created
}

/// Milliseconds between the first create event and the first transition to
/// `resolved`. `None` unless both exist.
pub fn resolution_duration_ms(
  events: &[AnalyticsEvent],
  transitions: &[StatusTransition],
) -> Option<i64> {
  let created = events
    .iter()
    .find(|e| e.event_type == EventType::IncidentCreate)?;
  let resolved = transitions
    .iter()
    .find(|t| t.to_status == IncidentStatus::Resolved)?;
  Some((resolved.timestamp - created.timestamp).num_milliseconds())
}

/// Assemble the audit report for one incident.
///
/// `events` is the full log; only entries for `incident_id` are kept, in log
/// order. `transitions` is that incident's transition sequence.
pub fn audit_report(
  incident_id: IncidentId,
  events: &[AnalyticsEvent],
  transitions: &[StatusTransition],
) -> IncidentAuditReport {
  let events: Vec<AnalyticsEvent> = events
    .iter()
    .filter(|e| e.incident_id == Some(incident_id))
    .cloned()
    .collect();
  let total_duration = resolution_duration_ms(&events, transitions);

  IncidentAuditReport {
    incident_id,
    transitions: transitions.to_vec(),
    events,
    total_duration,
  }
}

/// Aggregate snapshot evaluated at `now`.
///
/// - `status_changes_last_24h` counts status-change events with
///   `timestamp >= now - window`.
/// - `average_resolution_time` averages every transition to `resolved` whose
///   incident has a create event; untraceable resolutions are left out of both
///   sides of the mean.
pub fn observability_stats(
  events: &[AnalyticsEvent],
  transitions: &HashMap<IncidentId, Vec<StatusTransition>>,
  now: DateTime<Utc>,
  window: Duration,
) -> ObservabilityStats {
  let cutoff = now - window;

  let mut events_by_type: BTreeMap<EventType, usize> = BTreeMap::new();
  let mut incidents: HashSet<IncidentId> = HashSet::new();
  let mut status_changes_last_24h = 0;

  for ev in events {
    *events_by_type.entry(ev.event_type).or_insert(0) += 1;
    if let Some(id) = ev.incident_id {
      incidents.insert(id);
    }
    if ev.event_type == EventType::IncidentStatusChange && ev.timestamp >= cutoff {
      status_changes_last_24h += 1;
    }
  }

  let created = creation_times(events);
  let durations: Vec<i64> = transitions
    .values()
    .flatten()
    .filter(|t| t.to_status == IncidentStatus::Resolved)
    .filter_map(|t| {
      created
        .get(&t.incident_id)
        .map(|c| (t.timestamp - *c).num_milliseconds())
    })
    .collect();

  let average_resolution_time = if durations.is_empty() {
    None
  } else {
    Some(durations.iter().sum::<i64>() as f64 / durations.len() as f64)
  };

  ObservabilityStats {
    total_events: events.len(),
    total_incidents: incidents.len(),
    total_transitions: transitions.values().map(Vec::len).sum(),
    events_by_type,
    status_changes_last_24h,
    average_resolution_time,
  }
}

/// Group transitions per incident for export, ordered by incident id. Empty
/// sequences are skipped.
pub fn group_transitions(
  transitions: &HashMap<IncidentId, Vec<StatusTransition>>,
) -> Vec<IncidentTransitions> {
  let mut groups: Vec<IncidentTransitions> = transitions
    .iter()
    .filter(|(_, list)| !list.is_empty())
    .map(|(id, list)| IncidentTransitions {
      incident_id: *id,
      transitions: list.clone(),
    })
    .collect();
  groups.sort_by_key(|g| g.incident_id);
  groups
}
