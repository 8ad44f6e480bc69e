//! Avatar peer negotiation
//!
//! Builds a peer connection from server-provided relay endpoints,
//! exchanges session descriptions through the session protocol's own
//! avatar messages, and surfaces connectivity and remote tracks.

mod peer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

pub use peer::{
    IceServer, MediaKind, MediaTrack, PeerConnectionState, PeerEvent, PeerFactory,
    SessionDescription, SignalingPeer,
};

use crate::Result;

/// Upper bound on waiting for local candidate gathering; networks
/// without full discovery would otherwise stall negotiation.
pub const ICE_GATHERING_TIMEOUT: Duration = Duration::from_secs(2);

/// Validate server-provided relay data: a non-empty collection where
/// every entry carries at least one connection URL.
#[must_use]
pub fn valid_ice_servers(servers: &[IceServer]) -> bool {
    !servers.is_empty()
        && servers
            .iter()
            .all(|s| s.urls.iter().any(|u| !u.trim().is_empty()))
}

/// Drives peer negotiation for the avatar video feed
pub struct AvatarNegotiator {
    factory: Arc<dyn PeerFactory>,
    peer: Option<Box<dyn SignalingPeer>>,
}

impl AvatarNegotiator {
    /// Create a negotiator over a peer backend
    pub fn new(factory: Arc<dyn PeerFactory>) -> Self {
        Self {
            factory,
            peer: None,
        }
    }

    /// Whether a peer connection is currently alive
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.peer.is_some()
    }

    /// Build a peer from the relay list and produce the local
    /// description blob to forward through the session protocol.
    ///
    /// Invalid or absent relay data disables the avatar: returns
    /// `Ok(None)` without failing the session. Candidate gathering is
    /// bounded by [`ICE_GATHERING_TIMEOUT`]; hitting the bound is not
    /// an error, the description gathered so far is used.
    ///
    /// Renegotiation replaces any existing peer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if peer creation or the offer flow
    /// fails.
    pub async fn negotiate(
        &mut self,
        servers: &[IceServer],
    ) -> Result<Option<(String, mpsc::Receiver<PeerEvent>)>> {
        if !valid_ice_servers(servers) {
            tracing::debug!(count = servers.len(), "invalid relay server data, avatar disabled");
            return Ok(None);
        }

        if let Some(mut old) = self.peer.take() {
            old.close().await;
        }

        let mut peer = self.factory.create(servers)?;
        let events = peer.take_events();

        let offer = peer.create_offer().await?;
        peer.set_local_description(offer.clone()).await?;

        if tokio::time::timeout(ICE_GATHERING_TIMEOUT, peer.wait_ice_gathering_complete())
            .await
            .is_err()
        {
            tracing::debug!("candidate gathering timed out, using partial description");
        }

        let local = peer.local_description().unwrap_or(offer);
        let blob = local.to_blob();
        self.peer = Some(peer);

        tracing::info!(relays = servers.len(), "avatar offer ready");
        Ok(events.map(|rx| (blob, rx)))
    }

    /// Decode and apply the remote description from an
    /// avatar-connecting event.
    ///
    /// # Errors
    ///
    /// Returns `Error::Avatar` if the blob is malformed, no
    /// negotiation is in flight, or the peer rejects the description.
    pub async fn apply_remote(&mut self, blob: &str) -> Result<()> {
        let desc = SessionDescription::from_blob(blob)?;
        let peer = self
            .peer
            .as_mut()
            .ok_or_else(|| crate::Error::Avatar("no negotiation in flight".to_string()))?;
        peer.set_remote_description(desc).await?;
        tracing::debug!("remote avatar description applied");
        Ok(())
    }

    /// Tear down the peer connection. Idempotent.
    pub async fn close(&mut self) {
        if let Some(mut peer) = self.peer.take() {
            peer.close().await;
            tracing::debug!("avatar peer closed");
        }
    }
}
