//! Transport seam for the session protocol

use async_trait::async_trait;

use crate::protocol::{ClientEvent, ServerEvent};
use crate::Result;

/// An event surfaced by the transport to the session loop
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The underlying connection is established
    Opened,
    /// The underlying connection closed, with an optional reason
    Closed(Option<String>),
    /// A parsed protocol event
    Event(ServerEvent),
}

/// Bidirectional connection to the realtime service.
///
/// Implemented by [`crate::protocol::WsTransport`] for production and
/// by fakes in tests.
#[async_trait]
pub trait SessionTransport: Send {
    /// Send a protocol event.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the connection is unusable.
    async fn send(&mut self, event: &ClientEvent) -> Result<()>;

    /// Forward a raw PCM16 audio frame without modification.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the connection is unusable.
    async fn send_audio(&mut self, frame: &[u8]) -> Result<()>;

    /// Next inbound event; `None` once the stream is exhausted.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the close handshake fails.
    async fn close(&mut self) -> Result<()>;
}
