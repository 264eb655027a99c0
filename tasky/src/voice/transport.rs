//! Transport seam between the bridge loop and the live service

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::VoiceError;
use super::protocol::{ClientMessage, ServerMessage};

/// One open connection to the live service
#[async_trait]
pub trait LiveTransport: Send + Sync {
    async fn send(&mut self, message: ClientMessage) -> Result<(), VoiceError>;

    /// Next inbound message; `None` once the service has closed
    async fn recv(&mut self) -> Option<Result<ServerMessage, VoiceError>>;

    async fn close(&mut self) -> Result<(), VoiceError>;
}

/// Opens transports, one per activation
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn LiveTransport>, VoiceError>;
}

/// Transport over in-process channels
///
/// Outbound messages go to `outbound`; inbound messages are read from
/// `inbound` until its senders are dropped.
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
}

impl ChannelTransport {
    pub fn new(outbound: mpsc::UnboundedSender<ClientMessage>, inbound: mpsc::UnboundedReceiver<ServerMessage>) -> Self {
        Self { outbound, inbound }
    }

    /// Transport plus the far ends: a receiver of what we send and a sender for what we receive
    pub fn pair() -> (
        Self,
        mpsc::UnboundedReceiver<ClientMessage>,
        mpsc::UnboundedSender<ServerMessage>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (Self::new(out_tx, in_rx), out_rx, in_tx)
    }
}

#[async_trait]
impl LiveTransport for ChannelTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<(), VoiceError> {
        self.outbound
            .send(message)
            .map_err(|_| VoiceError::Transport("peer dropped".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage, VoiceError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), VoiceError> {
        debug!("ChannelTransport::close: called");
        self.inbound.close();
        Ok(())
    }
}
