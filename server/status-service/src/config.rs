//! Service configuration: defaults overridden from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
  pub bind_addr: SocketAddr,
  pub analytics: status_analytics::Config,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5005),
      analytics: status_analytics::Config::default(),
    }
  }
}

impl ServiceConfig {
  /// Reads `BIND_ADDR`, `PORT`, `ANALYTICS_MAX_EVENTS`,
  /// `ANALYTICS_RETENTION_SECS`. Unset variables keep their defaults.
  pub fn from_env() -> Result<Self, ServiceError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServiceError> {
    let mut config = Self::default();

    if let Some(ip) = lookup("BIND_ADDR") {
      let ip: IpAddr = ip
        .parse()
        .map_err(|e| ServiceError::Config(format!("BIND_ADDR: {}", e)))?;
      config.bind_addr.set_ip(ip);
    }
    if let Some(port) = lookup("PORT") {
      let port: u16 = port
        .parse()
        .map_err(|e| ServiceError::Config(format!("PORT: {}", e)))?;
      config.bind_addr.set_port(port);
    }
    if let Some(max) = lookup("ANALYTICS_MAX_EVENTS") {
      config.analytics.max_events = max
        .parse()
        .map_err(|e| ServiceError::Config(format!("ANALYTICS_MAX_EVENTS: {}", e)))?;
    }
    if let Some(secs) = lookup("ANALYTICS_RETENTION_SECS") {
      let secs: u64 = secs
        .parse()
        .map_err(|e| ServiceError::Config(format!("ANALYTICS_RETENTION_SECS: {}", e)))?;
      if secs == 0 {
        return Err(ServiceError::Config(
          "ANALYTICS_RETENTION_SECS: must be positive".into(),
        ));
      }
      config.analytics.retention_interval = Duration::from_secs(secs);
    }

    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn defaults_when_unset() {
    let config = ServiceConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(config.bind_addr.port(), 5005);
    assert!(config.bind_addr.ip().is_loopback());
    assert_eq!(config.analytics.max_events, 10_000);
  }

  #[test]
  fn overrides_from_env() {
    let config = ServiceConfig::from_lookup(lookup(&[
      ("PORT", "9000"),
      ("BIND_ADDR", "0.0.0.0"),
      ("ANALYTICS_MAX_EVENTS", "50"),
      ("ANALYTICS_RETENTION_SECS", "3600"),
    ]))
    .unwrap();
    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:9000");
    assert_eq!(config.analytics.max_events, 50);
    assert_eq!(config.analytics.retention_interval, Duration::from_secs(3600));
  }

  #[test]
  fn bad_values_name_the_variable() {
    let err = ServiceConfig::from_lookup(lookup(&[("PORT", "http")])).unwrap_err();
    assert!(err.to_string().contains("PORT"));
    let err = ServiceConfig::from_lookup(lookup(&[("ANALYTICS_RETENTION_SECS", "0")])).unwrap_err();
    assert!(err.to_string().contains("ANALYTICS_RETENTION_SECS"));
  }
}
