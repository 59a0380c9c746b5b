//! Structured error types for the analytics engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
  #[error("sink: {0}")]
  Sink(String),

  #[error("metrics: {0}")]
  Metrics(#[from] prometheus::Error),

  #[error("encode: {0}")]
  Encode(String),
}

impl AnalyticsError {
  pub fn sink(msg: impl Into<String>) -> Self {
    Self::Sink(msg.into())
  }

  pub fn encode(msg: impl Into<String>) -> Self {
    Self::Encode(msg.into())
  }
}
