//! Voxlink - Realtime speech-to-speech session client for AI voice agents
//!
//! This library provides the core functionality for a voxlink session:
//! - Realtime protocol connection (typed events over a websocket)
//! - Gapless, interruptible audio playback scheduling
//! - Avatar peer negotiation (SDP offer/answer over the session)
//! - Local tool execution raced against in-flight responses
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Caller                           │
//! │   send_text  │  send_audio  │  snapshot / watch     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Controller                     │
//! │   State Machine │ Scheduler │ Avatar │ Tool Executor │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Realtime Service                        │
//! │   session.* │ response.* │ input_audio_buffer.*     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod avatar;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tools;

pub use config::{AvatarConfig, SessionConfig, ToolDeclaration, TurnDetection};
pub use error::{Error, Result};
pub use session::{ConversationMessage, Role, SessionController, SessionSnapshot};
pub use tools::{Tool, ToolRegistry};
