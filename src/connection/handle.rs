//! Connection handle and inbound event pump

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::transport::{Transport, TransportEvent};
use super::{ConnectionEvent, ConnectionEvents, ConnectionState};
use crate::types::{Envelope, UpdateBatch};

struct Shared {
    state: ConnectionState,
    transport: Box<dyn Transport>,
    /// Frames sent before the channel opened
    pending: Vec<String>,
}

/// Sending side of one live channel.
///
/// Clones refer to the same channel. Once closed, a handle stays closed;
/// reconnecting produces a new handle.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    url: Arc<str>,
    transport_name: &'static str,
    shared: Arc<Mutex<Shared>>,
}

impl ConnectionHandle {
    pub(crate) fn connecting(
        id: u64,
        url: &str,
        transport_name: &'static str,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            id,
            url: Arc::from(url),
            transport_name,
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Connecting,
                transport,
                pending: Vec::new(),
            })),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Name of the factory that built the transport
    pub fn transport_name(&self) -> &'static str {
        self.transport_name
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Send `{"cmd": cmd, "data": data}` to the server.
    ///
    /// Queued while connecting, dropped once closed. Never fails.
    pub fn send(&self, cmd: &str, data: Value) {
        self.send_envelope(&Envelope::new(cmd, data));
    }

    pub fn send_envelope(&self, envelope: &Envelope) {
        self.send_text(envelope.to_json());
    }

    fn send_text(&self, text: String) {
        let mut shared = self.shared.lock();
        match shared.state {
            ConnectionState::Connecting => shared.pending.push(text),
            ConnectionState::Open => {
                if let Err(e) = shared.transport.send_text(text) {
                    tracing::warn!(id = self.id, error = %e, "Failed to send frame");
                }
            }
            ConnectionState::Absent | ConnectionState::Closed => {
                tracing::debug!(id = self.id, "Dropping frame for closed connection");
            }
        }
    }

    /// Tear down the transport. Idempotent.
    pub fn close(&self) {
        let mut shared = self.shared.lock();
        if shared.state == ConnectionState::Closed {
            return;
        }
        shared.transport.close();
        shared.state = ConnectionState::Closed;
        shared.pending.clear();
        tracing::info!(id = self.id, url = %self.url, "Connection closed");
    }

    /// Connecting → Open. Returns whether the state changed.
    fn mark_open(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.state != ConnectionState::Connecting {
            return false;
        }
        shared.state = ConnectionState::Open;
        let Shared {
            transport, pending, ..
        } = &mut *shared;
        for text in pending.drain(..) {
            if let Err(e) = transport.send_text(text) {
                tracing::warn!(id = self.id, error = %e, "Failed to flush queued frame");
            }
        }
        tracing::info!(id = self.id, url = %self.url, transport = self.transport_name, "Connection open");
        true
    }

    fn mark_closed(&self) {
        let mut shared = self.shared.lock();
        shared.state = ConnectionState::Closed;
        shared.pending.clear();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("transport", &self.transport_name)
            .field("state", &self.state())
            .finish()
    }
}

/// Receiving side of one live channel.
///
/// Decodes transport events into connection events, in arrival order.
pub struct EventPump {
    handle: ConnectionHandle,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    finished: bool,
}

impl EventPump {
    pub(crate) fn new(
        handle: ConnectionHandle,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            handle,
            events,
            finished: false,
        }
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Wait for the next event. `None` after the close event was delivered.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.finished {
            return None;
        }

        loop {
            let event = match self.events.recv().await {
                Some(event) => event,
                // Transport gone without saying goodbye
                None => TransportEvent::Closed(None),
            };

            match event {
                TransportEvent::Open => {
                    if self.handle.mark_open() {
                        return Some(ConnectionEvent::Open);
                    }
                    tracing::debug!(id = self.handle.id, "Ignoring open on a closed connection");
                }
                TransportEvent::Message(text) => {
                    if self.handle.state() == ConnectionState::Closed {
                        continue;
                    }
                    if let Some(event) = decode_message(self.handle.id, &text) {
                        return Some(event);
                    }
                }
                TransportEvent::Closed(reason) => {
                    self.finished = true;
                    self.handle.mark_closed();
                    return Some(ConnectionEvent::Closed { reason });
                }
            }
        }
    }

    /// Drive `sink` until the connection closes
    pub async fn run<E: ConnectionEvents + ?Sized>(mut self, sink: &mut E) {
        while let Some(event) = self.next_event().await {
            match event {
                ConnectionEvent::Open => sink.on_open(&self.handle),
                ConnectionEvent::Message { batch, .. } => sink.on_message(&self.handle, batch),
                ConnectionEvent::Closed { reason } => sink.on_close(&self.handle, reason),
            }
        }
    }
}

/// Decode `{cmd, data}` and keep `data` as the batch. Bad frames are dropped.
fn decode_message(id: u64, text: &str) -> Option<ConnectionEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(id, error = %e, "Dropping undecodable message");
            return None;
        }
    };
    let Envelope { cmd, data } = envelope;
    match UpdateBatch::from_value(data) {
        Some(batch) => Some(ConnectionEvent::Message { cmd, batch }),
        None => {
            tracing::warn!(id, cmd = %cmd, "Dropping message whose data is not an object");
            None
        }
    }
}
