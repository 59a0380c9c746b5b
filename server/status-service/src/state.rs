//! Shared application state.

use std::sync::Arc;

use status_analytics::{EventLog, MetricsRegistry};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::store::IncidentStore;

#[derive(Debug)]
pub struct AppState {
  pub analytics: Arc<EventLog>,
  pub metrics: Arc<MetricsRegistry>,
  pub incidents: IncidentStore,
}

impl AppState {
  pub fn new(analytics: Arc<EventLog>, metrics: Arc<MetricsRegistry>) -> Self {
    let incidents = IncidentStore::new(analytics.clone(), metrics.clone());
    Self {
      analytics,
      metrics,
      incidents,
    }
  }

  /// Fresh event log and registry built from config.
  pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
    let analytics = Arc::new(EventLog::new(config.analytics.clone()));
    let metrics = Arc::new(MetricsRegistry::new()?);
    Ok(Self::new(analytics, metrics))
  }
}
