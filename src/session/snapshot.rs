//! Read-only session projections exposed to callers

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Role of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Informational entries (tool calls, lifecycle notes)
    Status,
    /// Surfaced failures; the session stays alive
    Error,
}

/// One entry in the conversation transcript.
///
/// Content is mutable while the turn is streaming and frozen once the
/// turn completes; the list itself is append-only.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationMessage {
    /// Stable message identifier
    pub id: Uuid,

    /// Who produced the message
    pub role: Role,

    /// Textual content; grows while streaming
    pub content: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    /// Create a message with a fresh id and the current timestamp
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Immutable snapshot of session state.
///
/// Replaced wholesale (never mutated) on every state change, so
/// callers can diff by reference equality.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    /// Whether the protocol connection is up
    pub connected: bool,

    /// Whether microphone capture is active
    pub recording: bool,

    /// Whether the user is currently speaking (server VAD)
    pub speaking: bool,

    /// Whether the avatar peer connection is established
    pub avatar_connected: bool,

    /// Full ordered transcript
    pub messages: Vec<ConversationMessage>,

    /// Human-readable status line
    pub status: String,

    /// Remote session identifier, once known
    pub session_id: Option<String>,
}
