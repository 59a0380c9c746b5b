//! HTTP handlers: incident endpoints, read-only analytics reports, metrics scrape.

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use std::sync::Arc;

use status_analytics::{
  AnalyticsEvent, IncidentAuditReport, IncidentId, ObservabilityExport, ObservabilityStats,
  StatusTransition,
};

use crate::error::ServiceError;
use crate::state::AppState;
use crate::store::{CreateIncident, Incident, StoreStats, UpdateIncident};
use crate::types::*;

type AppResult<T> = Result<T, ServiceError>;

impl IntoResponse for ServiceError {
  fn into_response(self) -> Response {
    let (status, field) = match &self {
      ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, None),
      ServiceError::Validation { field, .. } => (StatusCode::BAD_REQUEST, Some(field.clone())),
      ServiceError::InvalidTransition { .. } => (StatusCode::CONFLICT, None),
      ServiceError::Config(_) | ServiceError::Analytics(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, None)
      }
    };
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = ErrorBody {
      error: true,
      message: self.to_string(),
      field,
    };
    (status, Json(body)).into_response()
  }
}

pub async fn health() -> &'static str {
  "ok"
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
  match state.metrics.metrics_text() {
    Ok(body) => ([(header::CONTENT_TYPE, state.metrics.content_type())], body).into_response(),
    Err(e) => {
      tracing::error!(error = %e, "metrics exposition failed");
      StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
  }
}

pub async fn metrics_json(
  State(state): State<Arc<AppState>>,
) -> Json<Vec<status_analytics::metrics::MetricFamilySnapshot>> {
  Json(state.metrics.metrics_json())
}

// ---------------------------------------------------------------------------
// Analytics reports (read-only)
// ---------------------------------------------------------------------------

pub async fn observability_stats(State(state): State<Arc<AppState>>) -> Json<ObservabilityStats> {
  Json(state.analytics.observability_stats())
}

pub async fn observability_export(
  State(state): State<Arc<AppState>>,
) -> Json<ObservabilityExport> {
  Json(state.analytics.export_observability_data())
}

pub async fn events(
  State(state): State<Arc<AppState>>,
  Query(query): Query<EventsQuery>,
) -> Json<Vec<AnalyticsEvent>> {
  let events = match query.event_type {
    Some(t) => state.analytics.events_by_type(t),
    None => state.analytics.events(),
  };
  Json(events)
}

pub async fn incident_audit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
) -> Json<IncidentAuditReport> {
  Json(state.analytics.incident_audit_report(id))
}

pub async fn incident_events(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
) -> Json<Vec<AnalyticsEvent>> {
  Json(state.analytics.incident_events(id))
}

pub async fn incident_transitions(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
) -> Json<Vec<StatusTransition>> {
  Json(state.analytics.incident_transitions(id))
}

// ---------------------------------------------------------------------------
// Public status page + admin session events
// ---------------------------------------------------------------------------

pub async fn public_status(State(state): State<Arc<AppState>>) -> Json<PublicStatus> {
  let active_incidents = state.incidents.active();
  state.analytics.track_public_status_view();
  Json(PublicStatus {
    operational: active_incidents.is_empty(),
    active_incidents,
  })
}

pub async fn admin_login(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<AdminPayload>,
) -> StatusCode {
  state.analytics.track_admin_login(&payload.admin_id);
  StatusCode::NO_CONTENT
}

pub async fn admin_logout(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<AdminPayload>,
) -> StatusCode {
  state.analytics.track_admin_logout(&payload.admin_id);
  StatusCode::NO_CONTENT
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

pub async fn list_incidents(State(state): State<Arc<AppState>>) -> Json<Vec<Incident>> {
  Json(state.incidents.list())
}

pub async fn create_incident(
  State(state): State<Arc<AppState>>,
  Json(payload): Json<CreateIncident>,
) -> AppResult<(StatusCode, Json<Incident>)> {
  let incident = state.incidents.create(payload)?;
  Ok((StatusCode::CREATED, Json(incident)))
}

pub async fn get_incident(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
) -> AppResult<Json<Incident>> {
  Ok(Json(state.incidents.get(id)?))
}

pub async fn update_incident(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
  Json(payload): Json<UpdateIncident>,
) -> AppResult<Json<Incident>> {
  Ok(Json(state.incidents.update(id, payload)?))
}

pub async fn update_incident_status(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
  Json(payload): Json<StatusUpdatePayload>,
) -> AppResult<Json<Incident>> {
  let incident = state
    .incidents
    .update_status(id, payload.status, payload.admin_id.as_deref())?;
  Ok(Json(incident))
}

pub async fn delete_incident(
  State(state): State<Arc<AppState>>,
  Path(id): Path<IncidentId>,
  Query(query): Query<AdminQuery>,
) -> AppResult<StatusCode> {
  state.incidents.delete(id, query.admin_id.as_deref())?;
  Ok(StatusCode::NO_CONTENT)
}

pub async fn incident_stats(State(state): State<Arc<AppState>>) -> Json<StoreStats> {
  Json(state.incidents.stats())
}

pub async fn clear_incidents(State(state): State<Arc<AppState>>) -> Json<Cleared> {
  Json(Cleared {
    removed: state.incidents.clear(),
  })
}
