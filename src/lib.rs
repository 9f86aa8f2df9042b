//! Katana Realtime
//!
//! Keeps build dashboard views in sync with server-side build state without
//! full page reloads, plus the relay server those views connect to.
//!
//! # Features
//!
//! - **One-shot snapshot**: the data a view was rendered with is applied first, exactly once
//! - **Live channel**: WebSocket push with an ordered list of fallback transports
//! - **Deterministic dispatch**: handlers run in registration order, whatever the payload order
//! - **Cooldown**: per-key throttling of re-renders, bypassed by forced updates
//! - **Relay**: polls JSON status URLs and pushes changes to subscribers
//!
//! # Modules
//!
//! - `types`: Update batches and the `{cmd, data}` wire envelope
//! - `snapshot`: Snapshot Loader
//! - `cooldown`: Cooldown Gate and clocks
//! - `connection`: Connection Manager, transports, handles
//! - `dispatch`: Handler registry and Dispatch Router
//! - `client`: `RealtimeClient`, the facade wiring everything together
//! - `config`: Client and relay configuration
//! - `api`: Relay server (axum)
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use katana_realtime::{HandlerRegistry, RealtimeClient, RealtimeConfig, SnapshotLoader};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = HandlerRegistry::new()
//!         .on("global", |data| println!("global: {}", data))
//!         .on("codebases", |data| println!("codebases: {}", data));
//!
//!     let config = RealtimeConfig::new("ws://buildmaster:8010/ws")
//!         .with_reload_cooldown(Duration::from_millis(5000));
//!     let snapshot = SnapshotLoader::embedded(r#"{"global": {"url": "http://buildmaster/json/globalstatus"}}"#);
//!
//!     let mut client = RealtimeClient::init(registry, snapshot, config);
//!     client.closed().await;
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod snapshot;
pub mod types;

// Re-export commonly used items at crate root
pub use client::RealtimeClient;
pub use config::{RealtimeConfig, RelayConfig};
pub use connection::{ConnectionHandle, ConnectionManager, ConnectionState};
pub use cooldown::{Clock, CooldownGate, ManualClock, SystemClock};
pub use dispatch::{DispatchRouter, HandlerRegistry};
pub use error::{ConfigError, RelayError, RelayResult, SnapshotError, TransportError};
pub use snapshot::{EmbeddedSnapshot, FileSnapshot, SnapshotLoader, SnapshotSource};
pub use types::{Envelope, UpdateBatch, UpdateKey};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
