//! WebSocket transport for the realtime protocol

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::protocol::{ClientEvent, ServerEvent, SessionTransport, TransportEvent};
use crate::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to the realtime service
pub struct WsTransport {
    ws: WsStream,
    opened: bool,
    closed: bool,
}

impl WsTransport {
    /// Connect to `endpoint`, attaching the credential as a bearer
    /// header on the upgrade request. The model is appended as a query
    /// parameter when the endpoint does not already carry one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the endpoint is malformed or the
    /// WebSocket handshake fails.
    pub async fn connect(endpoint: &str, credential: &str, model: &str) -> Result<Self> {
        let url = if endpoint.contains("model=") {
            endpoint.to_string()
        } else {
            let sep = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{sep}model={model}")
        };

        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| Error::Transport(format!("bad endpoint {url}: {e}")))?;
        {
            let headers = request.headers_mut();
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {credential}"))
                    .map_err(|e| Error::Transport(format!("bad credential: {e}")))?,
            );
            headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        }

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::Transport(format!("connect {url}: {e}")))?;

        tracing::debug!(endpoint = %url, "realtime transport connected");
        Ok(Self {
            ws,
            opened: false,
            closed: false,
        })
    }
}

#[async_trait]
impl SessionTransport for WsTransport {
    async fn send(&mut self, event: &ClientEvent) -> Result<()> {
        let text = serde_json::to_string(event)?;
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(format!("send failed: {e}")))
    }

    async fn send_audio(&mut self, frame: &[u8]) -> Result<()> {
        let event = ClientEvent::InputAudioAppend {
            audio: B64.encode(frame),
        };
        self.send(&event).await
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if !self.opened {
            self.opened = true;
            return Some(TransportEvent::Opened);
        }
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => return Some(TransportEvent::Event(event)),
                    Err(e) => {
                        tracing::debug!(error = %e, "skipping unparseable event");
                    }
                },
                Ok(Message::Close(frame)) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    return Some(TransportEvent::Closed(reason));
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Binary(bytes)) => {
                    tracing::debug!(len = bytes.len(), "ignoring binary frame");
                }
                Err(e) => return Some(TransportEvent::Closed(Some(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.ws
            .close(None)
            .await
            .map_err(|e| Error::Transport(format!("close failed: {e}")))
    }
}
