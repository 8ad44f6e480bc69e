//! Session state machine
//!
//! All mutable per-session state lives here, owned by the event loop
//! task and driven one event at a time. Nothing outside the loop holds
//! a reference to the protocol connection.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use tokio::sync::{mpsc, watch};

use crate::audio::{AudioSink, PlaybackScheduler};
use crate::avatar::{AvatarNegotiator, MediaTrack, PeerConnectionState, PeerEvent};
use crate::config::{SessionConfig, ToolDeclaration};
use crate::protocol::{ClientEvent, ConversationItem, ServerEvent, SessionTransport};
use crate::session::{ConversationMessage, Role, SessionSnapshot};
use crate::tools::{ToolCompletion, ToolExecutor};
use crate::Result;

/// Callback invoked with every published snapshot
pub type StateCallback = dyn Fn(Arc<SessionSnapshot>) + Send + Sync;

/// Callback invoked when a remote avatar media track arrives
pub type TrackCallback = dyn Fn(MediaTrack) + Send + Sync;

pub(crate) struct SessionState<S: AudioSink> {
    config: SessionConfig,
    scheduler: PlaybackScheduler<S>,
    negotiator: Option<AvatarNegotiator>,
    executor: ToolExecutor,
    declarations: Vec<ToolDeclaration>,

    messages: Vec<ConversationMessage>,
    connected: bool,
    recording: bool,
    speaking: bool,
    avatar_connected: bool,
    status: String,
    session_id: Option<String>,

    response_in_progress: bool,
    /// Index of the streaming user message for the current turn
    user_stream: Option<usize>,
    /// Index of the streaming assistant message for the current turn
    assistant_stream: Option<usize>,
    /// Partial tool-call arguments, keyed by call id
    call_args: HashMap<String, String>,
    /// Finished tool calls awaiting a safe point to hand back (FIFO)
    pending_results: VecDeque<ToolCompletion>,

    watch_tx: watch::Sender<Arc<SessionSnapshot>>,
    on_state: Option<Arc<StateCallback>>,
    on_track: Option<Arc<TrackCallback>>,
    /// Set once the disconnected snapshot is published; no mutation
    /// may be published after this.
    finished: bool,
}

impl<S: AudioSink> SessionState<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: SessionConfig,
        scheduler: PlaybackScheduler<S>,
        negotiator: Option<AvatarNegotiator>,
        executor: ToolExecutor,
        declarations: Vec<ToolDeclaration>,
        watch_tx: watch::Sender<Arc<SessionSnapshot>>,
        on_state: Option<Arc<StateCallback>>,
        on_track: Option<Arc<TrackCallback>>,
    ) -> Self {
        Self {
            config,
            scheduler,
            negotiator,
            executor,
            declarations,
            messages: Vec::new(),
            connected: false,
            recording: false,
            speaking: false,
            avatar_connected: false,
            status: "Connecting".to_string(),
            session_id: None,
            response_in_progress: false,
            user_stream: None,
            assistant_stream: None,
            call_args: HashMap::new(),
            pending_results: VecDeque::new(),
            watch_tx,
            on_state,
            on_track,
            finished: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether avatar media is expected over the peer connection
    fn avatar_active(&self) -> bool {
        self.config.avatar.enabled
            && self
                .negotiator
                .as_ref()
                .is_some_and(AvatarNegotiator::is_active)
    }

    /// Rebuild and publish the snapshot; no-op after teardown.
    fn publish(&mut self) {
        if self.finished {
            return;
        }
        let snapshot = Arc::new(SessionSnapshot {
            connected: self.connected,
            recording: self.recording,
            speaking: self.speaking,
            avatar_connected: self.avatar_connected,
            messages: self.messages.clone(),
            status: self.status.clone(),
            session_id: self.session_id.clone(),
        });
        let _ = self.watch_tx.send(Arc::clone(&snapshot));
        if let Some(cb) = &self.on_state {
            cb(snapshot);
        }
    }

    fn push_message(&mut self, role: Role, content: impl Into<String>) -> usize {
        self.messages.push(ConversationMessage::new(role, content));
        self.messages.len() - 1
    }

    /// Transport reported the connection established: configure the
    /// session and settle the initial status.
    pub(crate) async fn on_opened(&mut self, transport: &mut dyn SessionTransport) -> Result<()> {
        self.connected = true;
        self.status = "Connected".to_string();
        self.publish();

        let configure = ClientEvent::session_configure(&self.config, &self.declarations);
        transport.send(&configure).await?;

        if self.config.avatar.enabled && self.negotiator.is_some() {
            self.status = "Connecting avatar...".to_string();
        } else {
            // Some runtimes keep the output device suspended until an
            // explicit resume gesture.
            if let Err(e) = self.scheduler.resume() {
                tracing::warn!(error = %e, "audio resume failed");
            }
            self.status = "Ready".to_string();
        }
        self.publish();
        Ok(())
    }

    /// Transport closed on its own
    pub(crate) async fn on_closed(&mut self, reason: Option<String>) {
        if let Some(negotiator) = &mut self.negotiator {
            negotiator.close().await;
        }
        self.scheduler.stop();
        self.connected = false;
        self.speaking = false;
        self.avatar_connected = false;
        if let Some(detail) = &reason {
            self.push_message(Role::Error, format!("Connection lost: {detail}"));
        }
        self.status = format!(
            "Disconnected: {}",
            reason.unwrap_or_else(|| "connection closed".to_string())
        );
        self.publish();
        self.finished = true;
    }

    /// Deterministic teardown for a caller-requested disconnect.
    ///
    /// Each step is independent of the previous ones succeeding; the
    /// disconnected snapshot is always published.
    pub(crate) async fn teardown(&mut self, transport: &mut dyn SessionTransport) {
        if let Some(negotiator) = &mut self.negotiator {
            negotiator.close().await;
        }
        self.scheduler.stop();
        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "transport close failed during teardown");
        }
        self.connected = false;
        self.recording = false;
        self.speaking = false;
        self.avatar_connected = false;
        self.status = "Disconnected".to_string();
        self.publish();
        self.finished = true;
    }

    /// Caller sent text: append a user message and request a turn.
    pub(crate) async fn send_text(
        &mut self,
        text: &str,
        transport: &mut dyn SessionTransport,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        // A typed turn closes any in-flight transcription stream; only
        // the most recent message of a role may still grow.
        self.user_stream = None;
        self.push_message(Role::User, text);
        self.publish();

        transport
            .send(&ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(text),
            })
            .await?;
        transport
            .send(&ClientEvent::response_create(&["text", "audio"]))
            .await
    }

    /// Caller sent a raw audio frame: forward unless disconnected.
    pub(crate) async fn send_audio(
        &mut self,
        frame: &[u8],
        transport: &mut dyn SessionTransport,
    ) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        transport.send_audio(frame).await
    }

    pub(crate) fn set_recording(&mut self, on: bool) {
        self.recording = on;
        self.publish();
    }

    /// Dispatch one inbound protocol event.
    ///
    /// Returns a peer-event receiver when avatar negotiation started.
    pub(crate) async fn handle_server_event(
        &mut self,
        event: ServerEvent,
        transport: &mut dyn SessionTransport,
    ) -> Result<Option<mpsc::Receiver<PeerEvent>>> {
        match event {
            ServerEvent::SessionCreated { session } | ServerEvent::SessionUpdated { session } => {
                if let Some(id) = session.id {
                    self.session_id = Some(id);
                    self.publish();
                }
                if let Some(avatar) = session.avatar {
                    return self.start_avatar(&avatar.ice_servers, transport).await;
                }
            }
            ServerEvent::AvatarConnecting { server_description } => {
                self.apply_remote_description(&server_description).await;
            }
            ServerEvent::InputTranscriptionDelta { delta } => {
                match self.user_stream {
                    Some(index) => self.messages[index].content.push_str(&delta),
                    None => self.user_stream = Some(self.push_message(Role::User, delta)),
                }
                self.publish();
            }
            ServerEvent::InputTranscriptionCompleted { transcript } => {
                if self.user_stream.is_none() && !transcript.trim().is_empty() {
                    self.push_message(Role::User, transcript);
                    self.publish();
                }
                self.user_stream = None;
            }
            ServerEvent::SpeechStarted => {
                // Barge-in: the user is talking over the agent.
                self.scheduler.stop();
                self.speaking = true;
                self.publish();
            }
            ServerEvent::SpeechStopped => {
                self.speaking = false;
                self.publish();
            }
            ServerEvent::ResponseCreated { response } => {
                tracing::debug!(id = ?response.id, "response started");
                self.response_in_progress = true;
                self.assistant_stream = None;
                self.call_args.clear();
            }
            ServerEvent::TextDelta { delta }
            | ServerEvent::AudioTranscriptDelta { delta } => {
                match self.assistant_stream {
                    Some(index) => self.messages[index].content.push_str(&delta),
                    None => {
                        self.assistant_stream = Some(self.push_message(Role::Assistant, delta));
                    }
                }
                self.publish();
            }
            ServerEvent::FunctionCallArgumentsDelta { call_id, delta } => {
                self.call_args.entry(call_id).or_default().push_str(&delta);
            }
            ServerEvent::FunctionCallArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                let accumulated = self.call_args.remove(&call_id).unwrap_or_default();
                let args = if arguments.trim().is_empty() {
                    accumulated
                } else {
                    arguments
                };
                self.push_message(Role::Status, format!("Calling tool: {name}"));
                self.publish();
                self.executor.spawn(call_id, name, &args);
            }
            ServerEvent::AudioDelta { delta } => {
                if self.avatar_active() {
                    // Same audio rides the peer connection media track.
                    tracing::trace!("audio delta suppressed, avatar carries playback");
                } else {
                    match B64.decode(delta) {
                        Ok(frame) => {
                            if let Err(e) = self.scheduler.enqueue(&frame) {
                                tracing::warn!(error = %e, "audio frame dropped");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "invalid audio delta encoding"),
                    }
                }
            }
            ServerEvent::ResponseDone { response } => {
                self.response_in_progress = false;
                if response.is_failed() {
                    let message = response.failure_message();
                    self.status = format!("Error: {message}");
                    self.push_message(Role::Error, message);
                } else if self.assistant_stream.is_none() {
                    // No text was ever streamed; fall back to the
                    // transcript on the final payload.
                    if let Some(text) = response.fallback_text() {
                        self.push_message(Role::Assistant, text);
                    }
                }
                self.assistant_stream = None;
                self.publish();
                self.flush_pending(transport).await?;
            }
            ServerEvent::ServerError { error } => {
                self.status = format!("Error: {}", error.message);
                self.push_message(Role::Error, error.message);
                self.publish();
            }
            ServerEvent::Other => {
                tracing::trace!("ignoring unhandled event type");
            }
        }
        Ok(None)
    }

    /// Hand relay servers to the negotiator and forward the local
    /// description. Negotiation failures disable the avatar for the
    /// rest of the session; voice continues.
    async fn start_avatar(
        &mut self,
        ice_servers: &[crate::avatar::IceServer],
        transport: &mut dyn SessionTransport,
    ) -> Result<Option<mpsc::Receiver<PeerEvent>>> {
        if !self.config.avatar.enabled {
            return Ok(None);
        }
        let Some(negotiator) = &mut self.negotiator else {
            return Ok(None);
        };
        match negotiator.negotiate(ice_servers).await {
            Ok(Some((blob, events))) => {
                transport
                    .send(&ClientEvent::AvatarConnect {
                        client_description: blob,
                    })
                    .await?;
                Ok(Some(events))
            }
            Ok(None) => {
                // Unusable relay data: fall back to direct playback
                // without surfacing an error.
                if let Err(e) = self.scheduler.resume() {
                    tracing::warn!(error = %e, "audio resume failed");
                }
                self.status = "Ready".to_string();
                self.publish();
                Ok(None)
            }
            Err(e) => {
                self.disable_avatar(&format!("Avatar negotiation failed: {e}"))
                    .await;
                Ok(None)
            }
        }
    }

    async fn apply_remote_description(&mut self, blob: &str) {
        let Some(negotiator) = &mut self.negotiator else {
            tracing::debug!("avatar-connecting event without negotiation, ignored");
            return;
        };
        if let Err(e) = negotiator.apply_remote(blob).await {
            self.disable_avatar(&format!("Avatar connection failed: {e}"))
                .await;
        }
    }

    /// Avatar capability is gone for this session: surface the error,
    /// fall back to direct audio playback.
    async fn disable_avatar(&mut self, message: &str) {
        tracing::warn!(%message, "disabling avatar");
        if let Some(mut negotiator) = self.negotiator.take() {
            negotiator.close().await;
        }
        self.avatar_connected = false;
        if let Err(e) = self.scheduler.resume() {
            tracing::warn!(error = %e, "audio resume failed");
        }
        self.status = "Ready".to_string();
        self.push_message(Role::Error, message);
        self.publish();
    }

    /// Connectivity transitions and remote tracks from the peer
    pub(crate) fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::StateChanged(PeerConnectionState::Connected) => {
                self.avatar_connected = true;
                self.status = "Ready".to_string();
                self.publish();
            }
            PeerEvent::StateChanged(
                PeerConnectionState::Failed | PeerConnectionState::Disconnected,
            ) => {
                self.avatar_connected = false;
                self.publish();
            }
            PeerEvent::StateChanged(_) => {}
            PeerEvent::Track(track) => {
                tracing::debug!(kind = ?track.kind, id = %track.id, "remote track arrived");
                if let Some(cb) = &self.on_track {
                    cb(track);
                }
            }
        }
    }

    /// A tool finished: queue the result and, when no response is in
    /// flight, hand it back immediately.
    pub(crate) async fn handle_tool_completion(
        &mut self,
        done: ToolCompletion,
        transport: &mut dyn SessionTransport,
    ) -> Result<()> {
        self.pending_results.push_back(done);
        if !self.response_in_progress {
            self.flush_pending(transport).await?;
        }
        Ok(())
    }

    /// Hand at most one pending tool result to the protocol: a
    /// function-call-output item followed by a response request. The
    /// next queued result waits for the next safe point.
    async fn flush_pending(&mut self, transport: &mut dyn SessionTransport) -> Result<()> {
        let Some(done) = self.pending_results.pop_front() else {
            return Ok(());
        };
        tracing::debug!(call_id = %done.call_id, "sending tool result");
        transport
            .send(&ClientEvent::ConversationItemCreate {
                item: ConversationItem::function_call_output(done.call_id, done.output),
            })
            .await?;
        transport
            .send(&ClientEvent::response_create(&["text", "audio"]))
            .await
    }
}
