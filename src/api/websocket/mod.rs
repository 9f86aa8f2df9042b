//! WebSocket module for realtime dashboard updates
//!
//! Provides the `/ws` endpoint dashboards subscribe through.
//!
//! ## Protocol
//! - `{"cmd":"subscribe","data":{"key":K,"url":U}}` starts watching `U`
//! - a bare `http://...` URL subscribes under the URL itself
//! - `{"cmd":"unsubscribe","data":{"url":U}}` stops watching `U`
//! - changed JSON is pushed as `{"cmd":"krtJSONData","data":{K: json}}`

pub mod events;
pub mod handler;
pub mod state;

// Re-export commonly used items
pub use handler::ws_handler;
pub use state::{update_frame, ClientId, RelayState};
