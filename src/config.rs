//! Session configuration
//!
//! A [`SessionConfig`] is supplied once at connect time and is immutable
//! for the lifetime of the session.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default model identifier for realtime sessions
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Default spoken voice
pub const DEFAULT_VOICE: &str = "alloy";

/// Realtime session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Service endpoint (wss:// URL)
    pub endpoint: String,

    /// API credential for the service
    pub credential: String,

    /// Model identifier
    pub model: String,

    /// Spoken voice selector
    pub voice: String,

    /// System instructions for the agent
    pub instructions: String,

    /// Tools the agent may invoke (names resolved against the registry)
    pub enabled_tools: Vec<String>,

    /// Turn detection mode
    pub turn_detection: TurnDetection,

    /// Server-side noise suppression
    pub noise_suppression: bool,

    /// Server-side echo cancellation
    pub echo_cancellation: bool,

    /// Avatar video configuration
    pub avatar: AvatarConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            credential: String::new(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            instructions: String::new(),
            enabled_tools: Vec::new(),
            turn_detection: TurnDetection::ServerVad,
            noise_suppression: true,
            echo_cancellation: true,
            avatar: AvatarConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Validate the configuration before any network activity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the endpoint or credential is empty,
    /// or if the endpoint is not a valid URL.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint is required".to_string()));
        }
        if self.credential.trim().is_empty() {
            return Err(Error::Config("credential is required".to_string()));
        }
        url::Url::parse(&self.endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {}: {e}", self.endpoint)))?;
        Ok(())
    }
}

/// Turn detection mode requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnDetection {
    /// Server-side voice activity detection decides turn boundaries
    ServerVad,
    /// Semantic end-of-utterance detection
    SemanticVad,
    /// No automatic turn detection; caller commits turns explicitly
    None,
}

impl TurnDetection {
    /// Wire name used in the session-configure message
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::ServerVad => "server_vad",
            Self::SemanticVad => "semantic_vad",
            Self::None => "none",
        }
    }
}

/// Avatar video configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Whether to negotiate an avatar video feed
    pub enabled: bool,

    /// Avatar character identifier
    #[serde(default)]
    pub character: String,

    /// Avatar style identifier
    #[serde(default)]
    pub style: String,

    /// Whether the character/style pair is a custom deployment
    #[serde(default)]
    pub customized: bool,
}

/// A tool declaration advertised to the server at configure time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    /// Declaration type; always `"function"`
    #[serde(rename = "type")]
    pub kind: String,

    /// Tool name
    pub name: String,

    /// Human-readable description shown to the model
    pub description: String,

    /// JSON schema for the arguments object
    pub parameters: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_endpoint() {
        let config = SessionConfig {
            credential: "key".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_empty_credential() {
        let config = SessionConfig {
            endpoint: "wss://example.test/realtime".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let config = SessionConfig {
            endpoint: "wss://example.test/realtime".to_string(),
            credential: "key".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn turn_detection_wire_names() {
        assert_eq!(TurnDetection::ServerVad.wire_name(), "server_vad");
        assert_eq!(TurnDetection::SemanticVad.wire_name(), "semantic_vad");
        assert_eq!(TurnDetection::None.wire_name(), "none");
    }
}
