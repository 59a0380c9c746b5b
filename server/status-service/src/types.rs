//! Request/response types for the HTTP surface.

use serde::{Deserialize, Serialize};
use status_analytics::{EventType, IncidentStatus};

use crate::store::Incident;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
  pub status: IncidentStatus,
  #[serde(default)]
  pub admin_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPayload {
  pub admin_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuery {
  #[serde(default)]
  pub admin_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
  #[serde(default, rename = "type")]
  pub event_type: Option<EventType>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatus {
  pub operational: bool,
  pub active_incidents: Vec<Incident>,
}

#[derive(Debug, Serialize)]
pub struct Cleared {
  pub removed: usize,
}
