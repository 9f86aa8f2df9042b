//! Connection Manager
//!
//! Owns the single live push channel of a client.
//!
//! ## Lifecycle
//! - `Absent` before anything was opened
//! - `Connecting` once a transport was constructed
//! - `Open` after the transport reported its handshake
//! - `Closed` after `close()` or a transport-level close/error
//!
//! Inbound frames are `{ "cmd": string, "data": object }`; `data` is
//! forwarded as an [`UpdateBatch`] and `cmd` is passed through uninterpreted.

mod handle;
mod manager;
pub mod transport;
pub mod websocket;

use serde::Serialize;

use crate::types::UpdateBatch;

pub use handle::{ConnectionHandle, EventPump};
pub use manager::ConnectionManager;
pub use transport::{EventSender, Transport, TransportEvent, TransportFactory};
pub use websocket::{LegacyWebSocketFactory, WebSocketFactory};

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Absent,
    Connecting,
    Open,
    Closed,
}

/// Decoded events of one connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Open,
    Message { cmd: String, batch: UpdateBatch },
    Closed { reason: Option<String> },
}

/// Sinks for the three kinds of connection events
pub trait ConnectionEvents: Send {
    fn on_open(&mut self, handle: &ConnectionHandle);

    fn on_message(&mut self, handle: &ConnectionHandle, batch: UpdateBatch);

    fn on_close(&mut self, handle: &ConnectionHandle, reason: Option<String>);
}
