//! Scoped latency measurement for incident operations.

use std::time::Instant;

use crate::metrics::{MetricsRegistry, Operation, OperationStatus};

/// Measures one operation and records it exactly once.
///
/// `end` consumes the timer. A timer dropped without `end` (early return,
/// `?`, panic unwind) records the operation as `error`.
#[derive(Debug)]
pub struct OperationTimer<'a> {
  metrics: &'a MetricsRegistry,
  operation: Operation,
  start: Instant,
  recorded: bool,
}

impl<'a> OperationTimer<'a> {
  pub fn start(metrics: &'a MetricsRegistry, operation: Operation) -> Self {
    Self {
      metrics,
      operation,
      start: Instant::now(),
      recorded: false,
    }
  }

  pub fn operation(&self) -> Operation {
    self.operation
  }

  /// Seconds since `start`, without recording.
  pub fn elapsed_seconds(&self) -> f64 {
    self.start.elapsed().as_secs_f64()
  }

  /// Record the operation with `status` and return the elapsed seconds.
  pub fn end(mut self, status: OperationStatus) -> f64 {
    self.finish(status)
  }

  fn finish(&mut self, status: OperationStatus) -> f64 {
    let elapsed = self.elapsed_seconds();
    self.metrics.record_processing_latency(self.operation, status, elapsed);
    self.recorded = true;
    elapsed
  }
}

impl Drop for OperationTimer<'_> {
  fn drop(&mut self) {
    if !self.recorded {
      self.finish(OperationStatus::Error);
    }
  }
}
