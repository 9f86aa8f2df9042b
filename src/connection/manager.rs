//! Transport selection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::handle::{ConnectionHandle, EventPump};
use super::transport::TransportFactory;
use super::websocket::{LegacyWebSocketFactory, WebSocketFactory};

/// Opens live channels by trying transport factories in order
pub struct ConnectionManager {
    factories: Vec<Arc<dyn TransportFactory>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Manager over an explicit, ordered list of factories
    pub fn new(factories: Vec<Arc<dyn TransportFactory>>) -> Self {
        Self {
            factories,
            next_id: AtomicU64::new(1),
        }
    }

    /// Append a factory to try after the existing ones
    pub fn with_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Names of the factories, in the order they are tried
    pub fn factory_names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Open a channel to `url`.
    ///
    /// The first factory that constructs a transport wins. Returns `None`
    /// when none can, meaning realtime updates are unavailable.
    pub fn open(&self, url: &str) -> Option<(ConnectionHandle, EventPump)> {
        for factory in &self.factories {
            let (tx, rx) = mpsc::unbounded_channel();
            match factory.create(url, tx) {
                Ok(transport) => {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(id, url, transport = factory.name(), "Connecting");
                    let handle = ConnectionHandle::connecting(id, url, factory.name(), transport);
                    let pump = EventPump::new(handle.clone(), rx);
                    return Some((handle, pump));
                }
                Err(e) => {
                    tracing::debug!(transport = factory.name(), error = %e, "Transport not usable");
                }
            }
        }

        tracing::warn!(url, "No transport available, realtime updates disabled");
        None
    }
}

impl ConnectionManager {
    /// `primary`, then the plain-TCP fallback
    pub fn standard(primary: WebSocketFactory) -> Self {
        Self::new(vec![Arc::new(primary), Arc::new(LegacyWebSocketFactory)])
    }
}

impl Default for ConnectionManager {
    /// Primary WebSocket transport over the platform's roots, then the fallback
    fn default() -> Self {
        Self::standard(WebSocketFactory::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::transport::{EventSender, Transport};
    use crate::connection::ConnectionState;
    use crate::error::TransportError;

    struct NullTransport;

    impl Transport for NullTransport {
        fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }

        fn close(&mut self) {}
    }

    struct Fake {
        name: &'static str,
        available: bool,
    }

    impl TransportFactory for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn create(&self, _url: &str, _events: EventSender) -> Result<Box<dyn Transport>, TransportError> {
            if self.available {
                Ok(Box::new(NullTransport))
            } else {
                Err(TransportError::Unavailable(self.name.to_string()))
            }
        }
    }

    fn fake(name: &'static str, available: bool) -> Arc<dyn TransportFactory> {
        Arc::new(Fake { name, available })
    }

    #[test]
    fn test_primary_transport_wins() {
        let manager = ConnectionManager::new(vec![fake("WebSocket", true), fake("MozWebSocket", true)]);
        let (handle, _) = manager.open("ws://test.com:1234").unwrap();
        assert_eq!(handle.transport_name(), "WebSocket");
        assert_eq!(handle.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_fallback_when_primary_missing() {
        let manager = ConnectionManager::new(vec![fake("WebSocket", false), fake("MozWebSocket", true)]);
        let (handle, _) = manager.open("ws://test.com:1234").unwrap();
        assert_eq!(handle.transport_name(), "MozWebSocket");
    }

    #[test]
    fn test_no_transport_returns_none() {
        let manager = ConnectionManager::new(vec![fake("WebSocket", false), fake("MozWebSocket", false)]);
        assert!(manager.open("ws://test.com:1234").is_none());
        assert!(ConnectionManager::new(Vec::new()).open("ws://test.com:1234").is_none());
    }

    #[test]
    fn test_each_open_creates_new_handle() {
        let manager = ConnectionManager::new(vec![fake("WebSocket", true)]);
        let (first, _) = manager.open("ws://test.com:1234").unwrap();
        first.close();
        let (second, _) = manager.open("ws://test.com:1234").unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(first.state(), ConnectionState::Closed);
        assert_eq!(second.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_default_order() {
        let manager = ConnectionManager::default();
        assert_eq!(manager.factory_names(), vec!["websocket", "legacy-websocket"]);
        // Outside a runtime neither WebSocket transport can be built
        assert!(manager.open("ws://test.com:1234").is_none());
    }

    #[tokio::test]
    async fn test_falls_back_without_trusted_roots() {
        let manager = ConnectionManager::standard(WebSocketFactory::with_roots(
            rustls::RootCertStore::empty(),
        ));
        let (handle, _pump) = manager.open("ws://127.0.0.1:1/ws").unwrap();
        assert_eq!(handle.transport_name(), "legacy-websocket");
        handle.close();

        // The fallback only speaks plain ws://
        assert!(manager.open("wss://127.0.0.1:1/ws").is_none());
    }
}
