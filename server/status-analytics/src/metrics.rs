//! Prometheus metrics registry for the status service.
//!
//! # Metrics
//! - `status_service_processing_latency_seconds` (histogram): operation, status
//! - `status_service_operations_total` (counter): operation, status
//! - `status_service_database_latency_seconds` (histogram): operation, table
//! - `status_service_active_incidents` (gauge)
//! - `status_service_incident_status_counts` (gauge): status
//! - `status_service_incident_severity` (histogram): severity
//! - `status_service_process_*` on Linux
//!
//! Recording never fails to the caller; library errors are logged and dropped.
//! Exposition is the one fallible operation.

use std::collections::BTreeMap;

use prometheus::proto::{MetricFamily, MetricType};
use prometheus::{
  Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
  TextEncoder,
};
use serde::Serialize;

use crate::error::AnalyticsError;
use crate::types::{IncidentStatus, Severity, StatusCounts};

pub const NAMESPACE: &str = "status_service";

const PROCESSING_BUCKETS: [f64; 12] = [
  0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];
const DATABASE_BUCKETS: [f64; 11] = [
  0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];
// One bucket per severity ordinal.
const SEVERITY_BUCKETS: [f64; 4] = [0.5, 1.5, 2.5, 3.5];

// ---------------------------------------------------------------------------
// Label values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Update,
  StatusChange,
  List,
  Get,
  Delete,
  Stats,
  Clear,
}

impl Operation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Create => "create",
      Self::Update => "update",
      Self::StatusChange => "status_change",
      Self::List => "list",
      Self::Get => "get",
      Self::Delete => "delete",
      Self::Stats => "stats",
      Self::Clear => "clear",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStatus {
  Success,
  Error,
}

impl OperationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Success => "success",
      Self::Error => "error",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbOperation {
  Insert,
  Select,
  Update,
  Delete,
}

impl DbOperation {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Insert => "insert",
      Self::Select => "select",
      Self::Update => "update",
      Self::Delete => "delete",
    }
  }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MetricsRegistry {
  registry: Registry,
  processing_latency: HistogramVec,
  operations_total: IntCounterVec,
  database_latency: HistogramVec,
  active_incidents: IntGauge,
  incident_status_counts: IntGaugeVec,
  incident_severity: HistogramVec,
}

impl std::fmt::Debug for MetricsRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetricsRegistry")
      .field("namespace", &NAMESPACE)
      .finish_non_exhaustive()
  }
}

impl MetricsRegistry {
  /// Build a fresh registry with every series declared.
  pub fn new() -> Result<Self, AnalyticsError> {
    let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

    let processing_latency = HistogramVec::new(
      HistogramOpts::new(
        "processing_latency_seconds",
        "Time spent processing incident operations",
      )
      .buckets(PROCESSING_BUCKETS.to_vec()),
      &["operation", "status"],
    )?;
    let operations_total = IntCounterVec::new(
      Opts::new("operations_total", "Total incident operations by outcome"),
      &["operation", "status"],
    )?;
    let database_latency = HistogramVec::new(
      HistogramOpts::new("database_latency_seconds", "Time spent in database calls")
        .buckets(DATABASE_BUCKETS.to_vec()),
      &["operation", "table"],
    )?;
    let active_incidents = IntGauge::new("active_incidents", "Incidents not yet resolved")?;
    let incident_status_counts = IntGaugeVec::new(
      Opts::new("incident_status_counts", "Incidents per lifecycle status"),
      &["status"],
    )?;
    let incident_severity = HistogramVec::new(
      HistogramOpts::new(
        "incident_severity",
        "Severity of created incidents (low=1, medium=2, high=3, critical=4)",
      )
      .buckets(SEVERITY_BUCKETS.to_vec()),
      &["severity"],
    )?;

    registry.register(Box::new(processing_latency.clone()))?;
    registry.register(Box::new(operations_total.clone()))?;
    registry.register(Box::new(database_latency.clone()))?;
    registry.register(Box::new(active_incidents.clone()))?;
    registry.register(Box::new(incident_status_counts.clone()))?;
    registry.register(Box::new(incident_severity.clone()))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(
      prometheus::process_collector::ProcessCollector::for_self(),
    ))?;

    let metrics = Self {
      registry,
      processing_latency,
      operations_total,
      database_latency,
      active_incidents,
      incident_status_counts,
      incident_severity,
    };
    // Status series are visible at zero from the first scrape.
    metrics.reset_incident_status_counts_gauge();
    Ok(metrics)
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  // -------------------------------------------------------------------------
  // Recording
  // -------------------------------------------------------------------------

  /// Observe the latency histogram and bump the paired counter.
  pub fn record_processing_latency(
    &self,
    operation: Operation,
    status: OperationStatus,
    seconds: f64,
  ) {
    let labels = [operation.as_str(), status.as_str()];
    match self.processing_latency.get_metric_with_label_values(&labels) {
      Ok(h) => h.observe(seconds),
      Err(e) => dropped("processing_latency_seconds", &e),
    }
    match self.operations_total.get_metric_with_label_values(&labels) {
      Ok(c) => c.inc(),
      Err(e) => dropped("operations_total", &e),
    }
  }

  /// `table` is free text; keep it to stable table names.
  pub fn record_database_latency(&self, operation: DbOperation, table: &str, seconds: f64) {
    match self
      .database_latency
      .get_metric_with_label_values(&[operation.as_str(), table])
    {
      Ok(h) => h.observe(seconds),
      Err(e) => dropped("database_latency_seconds", &e),
    }
  }

  pub fn update_active_incidents_gauge(&self, count: i64) {
    self.active_incidents.set(count);
  }

  pub fn update_incident_status_counts_gauge(&self, counts: &StatusCounts) {
    for status in IncidentStatus::ALL {
      self.set_status_count(status, counts.get(status));
    }
  }

  /// Zero all four status series. Call when the incident store is cleared so
  /// stale readings do not outlive the data.
  pub fn reset_incident_status_counts_gauge(&self) {
    for status in IncidentStatus::ALL {
      self.set_status_count(status, 0);
    }
  }

  fn set_status_count(&self, status: IncidentStatus, value: i64) {
    match self
      .incident_status_counts
      .get_metric_with_label_values(&[status.as_str()])
    {
      Ok(g) => g.set(value),
      Err(e) => dropped("incident_status_counts", &e),
    }
  }

  pub fn record_incident_severity(&self, severity: Severity) {
    match self
      .incident_severity
      .get_metric_with_label_values(&[severity.as_str()])
    {
      Ok(h) => h.observe(severity.ordinal()),
      Err(e) => dropped("incident_severity", &e),
    }
  }

  // -------------------------------------------------------------------------
  // Exposition
  // -------------------------------------------------------------------------

  pub fn content_type(&self) -> &'static str {
    prometheus::TEXT_FORMAT
  }

  /// Fresh snapshot in the Prometheus text format.
  pub fn metrics_text(&self) -> Result<String, AnalyticsError> {
    let families = self.registry.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    String::from_utf8(buf).map_err(|e| AnalyticsError::encode(e.to_string()))
  }

  /// Structured equivalent of `metrics_text`, for debugging and tests.
  pub fn metrics_json(&self) -> Vec<MetricFamilySnapshot> {
    self.registry.gather().iter().map(snapshot_family).collect()
  }
}

fn dropped(series: &str, err: &prometheus::Error) {
  tracing::warn!(series, error = %err, "metric observation dropped");
}

// ---------------------------------------------------------------------------
// JSON snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamilySnapshot {
  pub name: String,
  pub help: String,
  #[serde(rename = "type")]
  pub kind: &'static str,
  pub values: Vec<MetricSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
  pub labels: BTreeMap<String, String>,
  pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
  Scalar(f64),
  Histogram {
    count: u64,
    sum: f64,
    buckets: Vec<BucketSample>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSample {
  pub le: f64,
  pub count: u64,
}

impl MetricFamilySnapshot {
  /// Scalar value of the sample whose labels include `name=value`.
  pub fn scalar_with_label(&self, name: &str, value: &str) -> Option<f64> {
    self
      .values
      .iter()
      .find(|s| s.labels.get(name).map(String::as_str) == Some(value))
      .and_then(|s| match s.value {
        MetricValue::Scalar(v) => Some(v),
        MetricValue::Histogram { .. } => None,
      })
  }
}

fn snapshot_family(family: &MetricFamily) -> MetricFamilySnapshot {
  let field_type = family.get_field_type();
  let kind = match field_type {
    MetricType::COUNTER => "counter",
    MetricType::GAUGE => "gauge",
    MetricType::HISTOGRAM => "histogram",
    MetricType::SUMMARY => "summary",
    MetricType::UNTYPED => "untyped",
  };

  let values = family
    .get_metric()
    .iter()
    .map(|m| {
      let labels = m
        .get_label()
        .iter()
        .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
        .collect();
      let value = match field_type {
        MetricType::COUNTER => MetricValue::Scalar(m.get_counter().get_value()),
        MetricType::GAUGE => MetricValue::Scalar(m.get_gauge().get_value()),
        MetricType::HISTOGRAM => {
          let h = m.get_histogram();
          MetricValue::Histogram {
            count: h.get_sample_count(),
            sum: h.get_sample_sum(),
            buckets: h
              .get_bucket()
              .iter()
              .map(|b| BucketSample {
                le: b.get_upper_bound(),
                count: b.get_cumulative_count(),
              })
              .collect(),
          }
        }
        MetricType::SUMMARY => MetricValue::Scalar(m.get_summary().get_sample_sum()),
        MetricType::UNTYPED => MetricValue::Scalar(m.get_untyped().get_value()),
      };
      MetricSample { labels, value }
    })
    .collect();

  MetricFamilySnapshot {
    name: family.get_name().to_string(),
    help: family.get_help().to_string(),
    kind,
    values,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn family<'a>(snap: &'a [MetricFamilySnapshot], name: &str) -> &'a MetricFamilySnapshot {
    snap
      .iter()
      .find(|f| f.name == name)
      .unwrap_or_else(|| panic!("missing family {}", name))
  }

  #[test]
  fn status_counts_appear_with_exact_values() {
    let m = MetricsRegistry::new().unwrap();
    m.update_incident_status_counts_gauge(&StatusCounts {
      investigating: 2,
      identified: 1,
      monitoring: 3,
      resolved: 4,
    });
    let text = m.metrics_text().unwrap();
    assert!(text.contains("status_service_incident_status_counts{status=\"investigating\"} 2"));
    assert!(text.contains("status_service_incident_status_counts{status=\"identified\"} 1"));
    assert!(text.contains("status_service_incident_status_counts{status=\"monitoring\"} 3"));
    assert!(text.contains("status_service_incident_status_counts{status=\"resolved\"} 4"));
    assert!(text.contains("# TYPE status_service_incident_status_counts gauge"));
  }

  #[test]
  fn reset_leaves_all_status_labels_at_zero() {
    let m = MetricsRegistry::new().unwrap();
    m.update_incident_status_counts_gauge(&StatusCounts {
      investigating: 5,
      identified: 5,
      monitoring: 5,
      resolved: 5,
    });
    m.reset_incident_status_counts_gauge();
    let text = m.metrics_text().unwrap();
    for status in IncidentStatus::ALL {
      let line = format!("status_service_incident_status_counts{{status=\"{}\"}} 0", status);
      assert!(text.contains(&line), "missing {}", line);
    }
  }

  #[test]
  fn processing_latency_pairs_histogram_and_counter() {
    let m = MetricsRegistry::new().unwrap();
    m.record_processing_latency(Operation::Create, OperationStatus::Success, 0.02);
    m.record_processing_latency(Operation::Create, OperationStatus::Success, 0.2);
    m.record_processing_latency(Operation::Create, OperationStatus::Error, 3.0);

    let snap = m.metrics_json();
    let ops = family(&snap, "status_service_operations_total");
    assert_eq!(ops.kind, "counter");
    let success = ops
      .values
      .iter()
      .find(|s| s.labels.get("status").map(String::as_str) == Some("success"))
      .unwrap();
    assert_eq!(success.value, MetricValue::Scalar(2.0));

    let latency = family(&snap, "status_service_processing_latency_seconds");
    let total: u64 = latency
      .values
      .iter()
      .map(|s| match &s.value {
        MetricValue::Histogram { count, buckets, .. } => {
          assert_eq!(buckets.len(), PROCESSING_BUCKETS.len());
          *count
        }
        MetricValue::Scalar(_) => panic!("expected histogram"),
      })
      .sum();
    assert_eq!(total, 3);
  }

  #[test]
  fn severity_lands_in_its_own_bucket() {
    let m = MetricsRegistry::new().unwrap();
    m.record_incident_severity(Severity::High);
    let snap = m.metrics_json();
    let sev = family(&snap, "status_service_incident_severity");
    let sample = &sev.values[0];
    assert_eq!(sample.labels.get("severity").map(String::as_str), Some("high"));
    match &sample.value {
      MetricValue::Histogram { count, sum, buckets } => {
        assert_eq!(*count, 1);
        assert!((sum - 3.0).abs() < f64::EPSILON);
        let counts: Vec<u64> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 0, 0, 1]);
      }
      MetricValue::Scalar(_) => panic!("expected histogram"),
    }
  }

  #[test]
  fn database_latency_uses_free_form_table() {
    let m = MetricsRegistry::new().unwrap();
    m.record_database_latency(DbOperation::Select, "incidents", 0.004);
    let text = m.metrics_text().unwrap();
    assert!(text.contains(
      "status_service_database_latency_seconds_count{operation=\"select\",table=\"incidents\"} 1"
    ));
  }

  #[test]
  fn active_incidents_gauge_keeps_last_value() {
    let m = MetricsRegistry::new().unwrap();
    m.update_active_incidents_gauge(7);
    m.update_active_incidents_gauge(3);
    let snap = m.metrics_json();
    let g = family(&snap, "status_service_active_incidents");
    assert_eq!(g.values[0].value, MetricValue::Scalar(3.0));
  }

  #[test]
  fn registries_are_independent() {
    let a = MetricsRegistry::new().unwrap();
    let b = MetricsRegistry::new().unwrap();
    a.update_active_incidents_gauge(9);
    let g = family(&b.metrics_json(), "status_service_active_incidents").clone();
    assert_eq!(g.values[0].value, MetricValue::Scalar(0.0));
  }
}
