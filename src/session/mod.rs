//! Session controller
//!
//! Top-level orchestrator for one realtime conversation: owns the
//! protocol connection, drives the playback scheduler, avatar
//! negotiator, and tool executor from a single event-loop task, and
//! exposes an immutable snapshot plus change notifications.

mod snapshot;
mod state;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

pub use snapshot::{ConversationMessage, Role, SessionSnapshot};
pub use state::{StateCallback, TrackCallback};

use crate::audio::{AudioSink, CpalSink, PlaybackScheduler};
use crate::avatar::{AvatarNegotiator, PeerEvent, PeerFactory};
use crate::config::SessionConfig;
use crate::protocol::{SessionTransport, TransportEvent, WsTransport};
use crate::session::state::SessionState;
use crate::tools::{ToolCompletion, ToolExecutor, ToolRegistry};
use crate::{Error, Result};

/// Caller requests forwarded into the event loop
enum Command {
    SendText(String),
    SendAudio(Vec<u8>),
    SetRecording(bool),
    Disconnect,
}

/// Orchestrates one realtime conversation session.
///
/// Construct with a configuration, optionally attach callbacks and a
/// peer factory, then `connect()`. All mutable session state is owned
/// by the internal event-loop task; this handle only carries channels.
pub struct SessionController {
    config: SessionConfig,
    registry: Arc<ToolRegistry>,
    peer_factory: Option<Arc<dyn PeerFactory>>,
    on_state: Option<Arc<StateCallback>>,
    on_track: Option<Arc<TrackCallback>>,
    watch_tx: watch::Sender<Arc<SessionSnapshot>>,
    watch_rx: watch::Receiver<Arc<SessionSnapshot>>,
    commands: Option<mpsc::Sender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Create a controller for `config` with the given tool registry
    #[must_use]
    pub fn new(config: SessionConfig, registry: Arc<ToolRegistry>) -> Self {
        let (watch_tx, watch_rx) = watch::channel(Arc::new(SessionSnapshot::default()));
        Self {
            config,
            registry,
            peer_factory: None,
            on_state: None,
            on_track: None,
            watch_tx,
            watch_rx,
            commands: None,
            task: None,
        }
    }

    /// Attach the peer backend used for avatar negotiation.
    ///
    /// Without a factory, an enabled avatar flag is silently ignored
    /// and audio plays directly.
    #[must_use]
    pub fn with_peer_factory(mut self, factory: Arc<dyn PeerFactory>) -> Self {
        self.peer_factory = Some(factory);
        self
    }

    /// Attach a state-change callback invoked with every snapshot
    #[must_use]
    pub fn on_state_change(
        mut self,
        callback: impl Fn(Arc<SessionSnapshot>) + Send + Sync + 'static,
    ) -> Self {
        self.on_state = Some(Arc::new(callback));
        self
    }

    /// Attach a callback for remote avatar media tracks
    #[must_use]
    pub fn on_track(
        mut self,
        callback: impl Fn(crate::avatar::MediaTrack) + Send + Sync + 'static,
    ) -> Self {
        self.on_track = Some(Arc::new(callback));
        self
    }

    /// Open the protocol connection and start the session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the endpoint or credential is empty
    /// (checked before any network activity) or the session is already
    /// connected, and `Error::Transport`/`Error::Audio` if the
    /// connection or audio device cannot be opened.
    pub async fn connect(&mut self) -> Result<()> {
        self.config.validate()?;
        let transport = WsTransport::connect(
            &self.config.endpoint,
            &self.config.credential,
            &self.config.model,
        )
        .await?;
        let sink = CpalSink::new()?;
        self.connect_with(Box::new(transport), sink)
    }

    /// Start the session over an injected transport and audio sink.
    ///
    /// This is the seam used by tests and by embedders with their own
    /// backends; `connect()` is a thin wrapper over it.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid or the
    /// session is already connected.
    pub fn connect_with<S: AudioSink + 'static>(
        &mut self,
        transport: Box<dyn SessionTransport>,
        sink: S,
    ) -> Result<()> {
        self.config.validate()?;
        if self.commands.is_some() {
            return Err(Error::Config("session already connected".to_string()));
        }

        let (command_tx, command_rx) = mpsc::channel(64);
        let (completion_tx, completion_rx) = mpsc::channel(16);

        let executor = ToolExecutor::new(Arc::clone(&self.registry), completion_tx);
        let declarations = self.registry.declarations(&self.config.enabled_tools);
        let negotiator = self
            .peer_factory
            .as_ref()
            .map(|f| AvatarNegotiator::new(Arc::clone(f)));

        let state = SessionState::new(
            self.config.clone(),
            PlaybackScheduler::new(sink),
            negotiator,
            executor,
            declarations,
            self.watch_tx.clone(),
            self.on_state.clone(),
            self.on_track.clone(),
        );

        self.commands = Some(command_tx);
        self.task = Some(tokio::spawn(run_loop(
            state,
            transport,
            command_rx,
            completion_rx,
        )));
        Ok(())
    }

    /// Tear the session down deterministically. Idempotent; safe to
    /// call from any state.
    pub async fn disconnect(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Disconnect).await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Send user text as a new conversational turn.
    ///
    /// Empty or whitespace-only input is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotConnected` if the session is not running.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let Some(commands) = &self.commands else {
            return Err(Error::NotConnected);
        };
        commands
            .send(Command::SendText(text.to_string()))
            .await
            .map_err(|_| Error::NotConnected)
    }

    /// Forward a raw PCM16 microphone frame; no-op unless connected.
    pub async fn send_audio(&self, frame: Vec<u8>) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::SendAudio(frame)).await;
        }
    }

    /// Flag whether microphone capture is active (snapshot only)
    pub async fn set_recording(&self, on: bool) {
        if let Some(commands) = &self.commands {
            let _ = commands.send(Command::SetRecording(on)).await;
        }
    }

    /// Current immutable snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.watch_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.watch_tx.subscribe()
    }
}

/// The single cooperative event loop for one session.
///
/// Ordering between inbound protocol events is their arrival order;
/// the only genuine race — a tool completion against a response
/// reaching its done state — is resolved by the pending-result queue
/// in [`SessionState`].
async fn run_loop<S: AudioSink>(
    mut state: SessionState<S>,
    mut transport: Box<dyn SessionTransport>,
    mut commands: mpsc::Receiver<Command>,
    mut completions: mpsc::Receiver<ToolCompletion>,
) {
    let mut peer_rx: Option<mpsc::Receiver<PeerEvent>> = None;

    while !state.is_finished() {
        tokio::select! {
            biased;

            command = commands.recv() => match command {
                Some(Command::SendText(text)) => {
                    if let Err(e) = state.send_text(&text, transport.as_mut()).await {
                        tracing::warn!(error = %e, "send_text failed");
                    }
                }
                Some(Command::SendAudio(frame)) => {
                    if let Err(e) = state.send_audio(&frame, transport.as_mut()).await {
                        tracing::debug!(error = %e, "audio frame not sent");
                    }
                }
                Some(Command::SetRecording(on)) => state.set_recording(on),
                Some(Command::Disconnect) | None => {
                    state.teardown(transport.as_mut()).await;
                    break;
                }
            },

            Some(done) = completions.recv() => {
                if let Err(e) = state.handle_tool_completion(done, transport.as_mut()).await {
                    tracing::warn!(error = %e, "tool result not delivered");
                }
            },

            event = next_peer_event(&mut peer_rx), if peer_rx.is_some() => match event {
                Some(event) => state.handle_peer_event(event),
                None => peer_rx = None,
            },

            event = transport.next_event() => match event {
                Some(TransportEvent::Opened) => {
                    if let Err(e) = state.on_opened(transport.as_mut()).await {
                        tracing::error!(error = %e, "session configure failed");
                        state.on_closed(Some(e.to_string())).await;
                        break;
                    }
                }
                Some(TransportEvent::Event(event)) => {
                    match state.handle_server_event(event, transport.as_mut()).await {
                        Ok(Some(rx)) => peer_rx = Some(rx),
                        Ok(None) => {}
                        Err(e) => tracing::warn!(error = %e, "event handling failed"),
                    }
                }
                Some(TransportEvent::Closed(reason)) => {
                    state.on_closed(reason).await;
                    break;
                }
                None => {
                    state.on_closed(Some("stream ended".to_string())).await;
                    break;
                }
            },
        }
    }

    tracing::debug!("session loop ended");
}

async fn next_peer_event(rx: &mut Option<mpsc::Receiver<PeerEvent>>) -> Option<PeerEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
