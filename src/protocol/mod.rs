//! Realtime session protocol
//!
//! Wire events for the bidirectional session channel plus the
//! transport seam ([`SessionTransport`]) and its WebSocket
//! implementation ([`WsTransport`]).

mod events;
mod transport;
mod ws;

pub use events::{
    AvatarInfo, ClientEvent, ConversationItem, ErrorDetail, ResponseInfo, ResponseResult,
    ServerEvent, SessionInfo,
};
pub use transport::{SessionTransport, TransportEvent};
pub use ws::WsTransport;
