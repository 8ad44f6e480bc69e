//! Wire event types for the realtime session protocol
//!
//! Events are JSON objects tagged by a `type` field. Inbound events the
//! client does not recognize deserialize to [`ServerEvent::Other`] and
//! are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::avatar::IceServer;
use crate::config::{SessionConfig, ToolDeclaration};

/// Events received from the server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Remote session established; carries the session identifier
    #[serde(rename = "session.created")]
    SessionCreated { session: SessionInfo },

    /// Session configuration acknowledged/changed; may carry avatar
    /// relay servers
    #[serde(rename = "session.updated")]
    SessionUpdated { session: SessionInfo },

    /// Remote peer description for the avatar connection (base64 blob)
    #[serde(rename = "session.avatar.connecting")]
    AvatarConnecting { server_description: String },

    /// Streaming transcription of user speech
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta { delta: String },

    /// User transcription finished for the turn
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    /// Server VAD detected the user speaking
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Server VAD detected the user stopped speaking
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// A new agent response cycle began
    #[serde(rename = "response.created")]
    ResponseCreated { response: ResponseInfo },

    /// Streaming assistant text
    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },

    /// Streaming transcript of synthesized assistant audio
    #[serde(rename = "response.audio_transcript.delta")]
    AudioTranscriptDelta { delta: String },

    /// Partial tool-call arguments, keyed by call id
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { call_id: String, delta: String },

    /// Tool-call arguments complete; execution may begin
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: String,
    },

    /// Base64-encoded PCM16 audio frame
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    /// Response cycle finished
    #[serde(rename = "response.done")]
    ResponseDone { response: ResponseResult },

    /// Server-reported error; session remains connected
    #[serde(rename = "error")]
    ServerError { error: ErrorDetail },

    /// Any event type this client does not handle
    #[serde(other)]
    Other,
}

/// Session payload on created/updated events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionInfo {
    /// Remote session identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Avatar negotiation data, present when an avatar was requested
    #[serde(default)]
    pub avatar: Option<AvatarInfo>,
}

/// Avatar payload inside session created/updated events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvatarInfo {
    /// Relay/reflection servers for the peer connection
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// Response payload on response.created
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
}

/// Response payload on response.done
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseResult {
    #[serde(default)]
    pub id: Option<String>,

    /// Terminal status: `completed`, `failed`, `cancelled`, ...
    #[serde(default)]
    pub status: Option<String>,

    /// Failure details when status is `failed`
    #[serde(default)]
    pub status_details: Option<Value>,

    /// Output items produced by the response
    #[serde(default)]
    pub output: Vec<Value>,
}

impl ResponseResult {
    /// Whether the response ended in a failure state
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.as_deref() == Some("failed")
    }

    /// Human-readable failure description
    #[must_use]
    pub fn failure_message(&self) -> String {
        self.status_details
            .as_ref()
            .and_then(|d| d.get("error"))
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| "response failed".to_string(), ToString::to_string)
    }

    /// Final transcript/text from the output items, for responses that
    /// never streamed text deltas.
    #[must_use]
    pub fn fallback_text(&self) -> Option<String> {
        for item in &self.output {
            let Some(parts) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for part in parts {
                if let Some(text) = part
                    .get("transcript")
                    .or_else(|| part.get("text"))
                    .and_then(Value::as_str)
                {
                    if !text.is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
        }
        None
    }
}

/// Error payload on server error events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Events sent to the server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Configure the session; sent once, immediately after connect
    #[serde(rename = "session.update")]
    SessionUpdate { session: Value },

    /// Forward the local peer description for the avatar (base64 blob)
    #[serde(rename = "session.avatar.connect")]
    AvatarConnect { client_description: String },

    /// Add an item to the conversation
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    /// Ask the server to produce a new response
    #[serde(rename = "response.create")]
    ResponseCreate { response: Value },

    /// Append a base64 PCM16 frame to the input audio buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend { audio: String },
}

impl ClientEvent {
    /// Build the session-configure message from a [`SessionConfig`]
    /// plus the tool declarations it enables.
    #[must_use]
    pub fn session_configure(config: &SessionConfig, tools: &[ToolDeclaration]) -> Self {
        let mut session = serde_json::json!({
            "modalities": ["text", "audio"],
            "model": config.model,
            "voice": config.voice,
            "instructions": config.instructions,
            "input_audio_format": "pcm16",
            "output_audio_format": "pcm16",
            "turn_detection": { "type": config.turn_detection.wire_name() },
            "input_audio_noise_reduction": config.noise_suppression,
            "input_audio_echo_cancellation": config.echo_cancellation,
            "tools": tools,
        });
        if config.avatar.enabled {
            session["avatar"] = serde_json::json!({
                "character": config.avatar.character,
                "style": config.avatar.style,
                "customized": config.avatar.customized,
            });
        }
        Self::SessionUpdate { session }
    }

    /// Build a response-create message requesting the given modalities
    #[must_use]
    pub fn response_create(modalities: &[&str]) -> Self {
        Self::ResponseCreate {
            response: serde_json::json!({ "modalities": modalities }),
        }
    }
}

/// Conversation item payloads for `conversation.item.create`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ConversationItem {
    /// A user text message
    #[serde(rename = "message")]
    Message {
        role: &'static str,
        content: Vec<Value>,
    },

    /// Output of a completed tool call
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

impl ConversationItem {
    /// A user message carrying plain input text
    #[must_use]
    pub fn user_text(text: &str) -> Self {
        Self::Message {
            role: "user",
            content: vec![serde_json::json!({ "type": "input_text", "text": text })],
        }
    }

    /// A function-call-output item for a finished tool call
    #[must_use]
    pub fn function_call_output(call_id: String, output: String) -> Self {
        Self::FunctionCallOutput { call_id, output }
    }
}
