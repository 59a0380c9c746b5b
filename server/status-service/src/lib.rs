//! Status Service
//!
//! HTTP service wiring the analytics engine to an in-memory incident store.
//! Report and metrics endpoints are read-only. Bind to 127.0.0.1 by default.

pub mod config;
pub mod error;
mod handlers;
mod state;
pub mod store;
mod types;

use axum::{
  routing::{get, patch, post},
  Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServiceConfig;
pub use error::ServiceError;
pub use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    .route("/metrics", get(handlers::metrics))
    .route("/metrics.json", get(handlers::metrics_json))
    .route("/api/status", get(handlers::public_status))
    .route("/api/admin/login", post(handlers::admin_login))
    .route("/api/admin/logout", post(handlers::admin_logout))
    .route(
      "/api/incidents",
      get(handlers::list_incidents)
        .post(handlers::create_incident)
        .delete(handlers::clear_incidents),
    )
    .route("/api/incidents/stats", get(handlers::incident_stats))
    .route(
      "/api/incidents/:id",
      get(handlers::get_incident)
        .patch(handlers::update_incident)
        .delete(handlers::delete_incident),
    )
    .route("/api/incidents/:id/status", patch(handlers::update_incident_status))
    .route("/api/observability/stats", get(handlers::observability_stats))
    .route("/api/observability/export", get(handlers::observability_export))
    .route("/api/observability/events", get(handlers::events))
    .route(
      "/api/observability/incidents/:id/audit",
      get(handlers::incident_audit),
    )
    .route(
      "/api/observability/incidents/:id/events",
      get(handlers::incident_events),
    )
    .route(
      "/api/observability/incidents/:id/transitions",
      get(handlers::incident_transitions),
    )
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
