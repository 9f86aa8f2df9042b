//! Katana Relay - Binary Entry Point
//!
//! Serves the `/ws` endpoint dashboards subscribe through.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use katana_realtime::api::{self, RelayState};
use katana_realtime::config::RelayConfig;

fn init_tracing() {
    let log_format = std::env::var("KATANA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = RelayConfig::from_env()?;

    let listener = TcpListener::bind(config.listen_addr).await?;
    let state = Arc::new(RelayState::new(config));

    api::serve(listener, state, shutdown_signal()).await?;
    Ok(())
}
