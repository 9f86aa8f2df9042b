//! Relay server
//!
//! Dashboards subscribe to JSON status URLs over a WebSocket; the relay polls
//! those URLs and pushes whatever changed.

pub mod http;
pub mod poller;
pub mod websocket;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::RelayResult;

pub use http::create_router;
pub use poller::UrlPoller;
pub use websocket::RelayState;

/// Serve the relay on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: Arc<RelayState>, shutdown: F) -> RelayResult<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let poller = tokio::spawn(UrlPoller::new(state.clone()).run());

    tracing::info!(addr = %listener.local_addr()?, "Relay listening");
    let result = axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await;

    poller.abort();
    result?;
    Ok(())
}
