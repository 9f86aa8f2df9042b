//! WebSocket transports built on tokio-tungstenite

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, WebSocketStream};
use url::Url;

use super::transport::{EventSender, Transport, TransportEvent, TransportFactory};
use crate::error::TransportError;

/// Primary transport: `ws://` and `wss://` through tokio-tungstenite.
///
/// Needs a TLS client configuration; without trusted root certificates it
/// reports itself unavailable and the connection manager moves on.
#[derive(Debug, Clone)]
pub struct WebSocketFactory {
    tls: Result<Arc<ClientConfig>, String>,
}

/// Fallback transport: plain `ws://` over a bare TCP stream, no TLS layer
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyWebSocketFactory;

impl WebSocketFactory {
    /// Trust the platform's root certificates
    pub fn new() -> Self {
        let loaded = rustls_native_certs::load_native_certs();
        for e in &loaded.errors {
            tracing::debug!(error = %e, "Skipping native certificate source");
        }
        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
        tracing::debug!(added, ignored, "Loaded native root certificates");
        Self::with_roots(roots)
    }

    /// Trust exactly `roots`
    pub fn with_roots(roots: RootCertStore) -> Self {
        Self {
            tls: client_config(roots).map(Arc::new),
        }
    }

    pub fn is_available(&self) -> bool {
        self.tls.is_ok()
    }
}

impl Default for WebSocketFactory {
    fn default() -> Self {
        Self::new()
    }
}

fn client_config(roots: RootCertStore) -> Result<ClientConfig, String> {
    if roots.is_empty() {
        return Err("no trusted root certificates".to_string());
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| e.to_string())?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

impl TransportFactory for WebSocketFactory {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError> {
        let url = parse_url(url, &["ws", "wss"])?;
        let tls = self.tls.clone().map_err(TransportError::Unavailable)?;
        let runtime = current_runtime()?;
        Ok(Box::new(TungsteniteTransport::spawn(&runtime, url, events, Dialer::Tls(tls))))
    }
}

impl TransportFactory for LegacyWebSocketFactory {
    fn name(&self) -> &'static str {
        "legacy-websocket"
    }

    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError> {
        let url = parse_url(url, &["ws"])?;
        let runtime = current_runtime()?;
        Ok(Box::new(TungsteniteTransport::spawn(&runtime, url, events, Dialer::PlainTcp)))
    }
}

fn parse_url(raw: &str, schemes: &[&str]) -> Result<Url, TransportError> {
    let url = Url::parse(raw)?;
    if !schemes.contains(&url.scheme()) {
        return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
    }
    Ok(url)
}

fn current_runtime() -> Result<Handle, TransportError> {
    Handle::try_current().map_err(|e| TransportError::Unavailable(e.to_string()))
}

enum Dialer {
    Tls(Arc<ClientConfig>),
    PlainTcp,
}

enum Outgoing {
    Text(String),
    Close,
}

/// Handle to a socket driven by a background task
pub struct TungsteniteTransport {
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl TungsteniteTransport {
    fn spawn(runtime: &Handle, url: Url, events: EventSender, dialer: Dialer) -> Self {
        let (outgoing, rx) = mpsc::unbounded_channel();
        runtime.spawn(async move {
            let reason = match dialer {
                Dialer::Tls(tls) => {
                    let connector = Some(Connector::Rustls(tls));
                    match tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
                        .await
                    {
                        Ok((socket, _)) => drive(socket, rx, &events).await,
                        Err(e) => Some(e.to_string()),
                    }
                }
                Dialer::PlainTcp => match dial_plain(&url).await {
                    Ok(socket) => drive(socket, rx, &events).await,
                    Err(e) => Some(e),
                },
            };
            tracing::debug!(url = %url, ?reason, "WebSocket task finished");
            let _ = events.send(TransportEvent::Closed(reason));
        });
        Self { outgoing }
    }
}

impl Transport for TungsteniteTransport {
    fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

async fn dial_plain(url: &Url) -> Result<WebSocketStream<TcpStream>, String> {
    let host = url.host_str().ok_or_else(|| "URL has no host".to_string())?;
    let port = url.port_or_known_default().unwrap_or(80);
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| e.to_string())?;
    let (socket, _) = tokio_tungstenite::client_async(url.as_str(), stream)
        .await
        .map_err(|e| e.to_string())?;
    Ok(socket)
}

/// Pump frames both ways until either side stops. Returns the close reason.
async fn drive<S>(
    socket: WebSocketStream<S>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: &EventSender,
) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let _ = events.send(TransportEvent::Open);
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            out = outgoing.recv() => {
                match out {
                    Some(Outgoing::Text(text)) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            return Some(e.to_string());
                        }
                    }
                    // Closed locally, or every sender dropped
                    Some(Outgoing::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return None;
                    }
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return frame.map(|f| f.reason.to_string());
                    }
                    Some(Ok(_)) => {} // Binary and control frames
                    Some(Err(e)) => return Some(e.to_string()),
                    None => return None,
                }
            }
        }
    }
}
