//! Status Service Analytics Engine — in-process observability core.
//!
//! Records incident lifecycle events in an append-only log, derives
//! per-incident status transitions, audit reports and aggregate stats, and
//! keeps a Prometheus registry for latency/gauge instrumentation.
//!
//! No DB, no network; pure computation + in-memory state.

pub mod config;
pub mod error;
pub mod event_log;
pub mod metrics;
pub mod retention;
pub mod shared;
pub mod stats;
pub mod timer;
pub mod types;

pub use config::Config;
pub use error::AnalyticsError;
pub use event_log::{EventLog, EventSink, TracingSink};
pub use metrics::{DbOperation, MetricsRegistry, Operation, OperationStatus};
pub use timer::OperationTimer;
pub use types::{
  AnalyticsEvent, EventType, IncidentAuditReport, IncidentId, IncidentStatus, NewEvent,
  ObservabilityExport, ObservabilityStats, Severity, StatusCounts, StatusTransition,
};
