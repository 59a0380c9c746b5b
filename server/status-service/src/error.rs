//! Structured error types for the status service.

use status_analytics::{IncidentId, IncidentStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("incident {0} not found")]
  NotFound(IncidentId),

  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("invalid transition: {from} -> {to}")]
  InvalidTransition {
    from: IncidentStatus,
    to: IncidentStatus,
  },

  #[error("config: {0}")]
  Config(String),

  #[error(transparent)]
  Analytics(#[from] status_analytics::AnalyticsError),
}

impl ServiceError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }
}
