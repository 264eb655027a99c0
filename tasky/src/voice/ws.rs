//! WebSocket transport for the live service

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::VoiceError;
use super::protocol::{ClientMessage, ServerMessage};
use super::transport::{LiveConnector, LiveTransport};

/// Connects to the live endpoint with an API key
#[derive(Clone)]
pub struct WsConnector {
    url: String,
    api_key: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.url, sep, self.api_key)
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn LiveTransport>, VoiceError> {
        debug!(url = %self.url, "WsConnector::connect: called");
        let (stream, response) = connect_async(self.endpoint())
            .await
            .map_err(|e| VoiceError::Transport(format!("connect failed: {}", e)))?;
        info!(status = %response.status(), "Live session connected");
        Ok(Box::new(WsLiveTransport { stream }))
    }
}

/// An open WebSocket to the live service
pub struct WsLiveTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl LiveTransport for WsLiveTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<(), VoiceError> {
        let json = serde_json::to_string(&message)?;
        self.stream
            .send(Message::text(json))
            .await
            .map_err(|e| VoiceError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, VoiceError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => return Some(Err(VoiceError::Transport(e.to_string()))),
            };
            // The service sends JSON in both text and binary frames
            match frame {
                Message::Text(text) => return Some(serde_json::from_str(text.as_str()).map_err(VoiceError::from)),
                Message::Binary(bytes) => return Some(serde_json::from_slice(&bytes).map_err(VoiceError::from)),
                Message::Close(frame) => {
                    info!(?frame, "Live session closed by service");
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<(), VoiceError> {
        debug!("WsLiveTransport::close: called");
        if let Err(e) = self.stream.close(None).await {
            warn!(error = %e, "Close handshake failed");
        }
        Ok(())
    }
}
