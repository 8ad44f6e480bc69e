//! Peer-connection capability seam
//!
//! The negotiator drives an injected [`SignalingPeer`] so the core
//! logic runs against fakes in tests and against whatever WebRTC
//! backend the embedding runtime provides in production.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// A relay/reflection endpoint supplied by the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IceServer {
    /// Connection URLs (`turn:`/`stun:` schemes)
    #[serde(default)]
    pub urls: Vec<String>,

    /// Relay username, when required
    #[serde(default)]
    pub username: Option<String>,

    /// Relay credential, when required
    #[serde(default)]
    pub credential: Option<String>,
}

/// A local or remote peer session description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    /// Description type: `offer` or `answer`
    #[serde(rename = "type")]
    pub kind: String,

    /// SDP payload
    pub sdp: String,
}

impl SessionDescription {
    /// Serialize to the base64 blob carried in avatar-connect messages
    #[must_use]
    pub fn to_blob(&self) -> String {
        // Serialization of two string fields cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        B64.encode(json)
    }

    /// Parse a base64 blob received in an avatar-connecting event.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if the blob is not base64 or not a
    /// JSON object with `type` and `sdp` fields.
    pub fn from_blob(blob: &str) -> Result<Self> {
        let bytes = B64
            .decode(blob.trim())
            .map_err(|e| Error::Avatar(format!("invalid description blob: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Avatar(format!("invalid description payload: {e}")))
    }
}

/// Peer connectivity status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Failed,
    Disconnected,
}

/// Kind of a remote media track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

/// A remote media track exposed by the peer connection.
///
/// Rendering is outside this crate; the track is handed to the caller
/// as an opaque identifier plus its kind.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    pub kind: MediaKind,
    pub id: String,
}

/// Events emitted by a peer connection
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Connectivity transition
    StateChanged(PeerConnectionState),
    /// A remote media track arrived
    Track(MediaTrack),
}

/// A peer connection under negotiation.
///
/// Implementations are created by a [`PeerFactory`] pre-configured
/// with one bidirectional audio transceiver, one bidirectional video
/// transceiver, and a diagnostics data channel.
#[async_trait]
pub trait SignalingPeer: Send {
    /// Create the local offer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if offer creation fails.
    async fn create_offer(&mut self) -> Result<SessionDescription>;

    /// Apply the local description.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if the description is rejected.
    async fn set_local_description(&mut self, desc: SessionDescription) -> Result<()>;

    /// Resolves when local candidate gathering completes.
    ///
    /// Callers bound this with a timeout; some networks never finish
    /// discovery.
    async fn wait_ice_gathering_complete(&mut self);

    /// Local description including any candidates gathered so far
    fn local_description(&self) -> Option<SessionDescription>;

    /// Apply the remote description.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if the description is rejected.
    async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()>;

    /// Take the event channel; yields connectivity transitions and
    /// remote tracks. May only be taken once.
    fn take_events(&mut self) -> Option<mpsc::Receiver<PeerEvent>>;

    /// Tear the connection down. Idempotent.
    async fn close(&mut self);
}

/// Builds peer connections from server-provided relay endpoints
pub trait PeerFactory: Send + Sync {
    /// Create a peer configured with the given relay servers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if the backend cannot create a peer.
    fn create(&self, ice_servers: &[IceServer]) -> Result<Box<dyn SignalingPeer>>;
}
