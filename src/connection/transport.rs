//! Transport seam between the connection manager and the wire

use tokio::sync::mpsc;

use crate::error::TransportError;

/// Raw events a transport reports back to its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The underlying channel finished its handshake
    Open,
    /// A text frame arrived
    Message(String),
    /// The channel is gone, with the peer's or the error's reason
    Closed(Option<String>),
}

/// Where a transport delivers its events
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// A live bidirectional channel
pub trait Transport: Send {
    /// Queue a text frame for the peer
    fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Tear the channel down
    fn close(&mut self);
}

/// Constructs transports of one kind.
///
/// `create` returning an error means "this kind cannot be used here"; the
/// connection manager then moves on to the next factory.
pub trait TransportFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn create(&self, url: &str, events: EventSender) -> Result<Box<dyn Transport>, TransportError>;
}
