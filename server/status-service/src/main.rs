//! Binary entrypoint for the status service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use status_service::{AppState, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "status_service=info,status_analytics=info,tower_http=info".into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = ServiceConfig::from_env()?;
  tracing::info!(
    bind_addr = %config.bind_addr,
    max_events = config.analytics.max_events,
    retention_secs = config.analytics.retention_interval.as_secs(),
    "configuration loaded"
  );

  let state = Arc::new(AppState::from_config(&config)?);
  state.analytics.spawn_retention();

  let app = status_service::router(state.clone());
  let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
  tracing::info!(address = %listener.local_addr()?, "status-service listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  state.analytics.close();
  tracing::info!("shutdown complete");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
}
