//! WebSocket Client für den Signaling-Server
//!
//! Eine Verbindung = ein `SignalingLink`:
//! - Read-Task parst Envelopes und leitet sie weiter
//! - Write-Task serialisiert ausgehende Frames
//! - Schließen über `close()` oder durch Droppen des Links

use super::messages::{decode, Inbound, SignalMessage};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

const CHANNEL_CAPACITY: usize = 100;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone)]
pub enum SignalingError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected to signaling server")]
    NotConnected,

    #[error("Failed to send message: {0}")]
    SendFailed(String),
}

// ============================================================================
// LINK
// ============================================================================

/// Frames für den Write-Task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close,
}

/// Eine offene Control-Connection
pub struct SignalingLink {
    outbound: mpsc::Sender<Outgoing>,
    inbound: mpsc::Receiver<Inbound>,
    reader: Option<JoinHandle<()>>,
}

/// Gegenstelle eines In-Memory Links
pub struct LinkRemote {
    pub outgoing: mpsc::Receiver<Outgoing>,
    pub incoming: mpsc::Sender<Inbound>,
}

impl SignalingLink {
    /// Link ohne Socket, z.B. für Tests oder eigene Transporte
    pub fn in_memory() -> (Self, LinkRemote) {
        let (outbound, outgoing) = mpsc::channel(CHANNEL_CAPACITY);
        let (incoming, inbound) = mpsc::channel(CHANNEL_CAPACITY);

        let link = Self {
            outbound,
            inbound,
            reader: None,
        };
        (link, LinkRemote { outgoing, incoming })
    }

    /// Sendet eine Nachricht als Envelope
    pub async fn send(&self, msg: &SignalMessage) -> Result<(), SignalingError> {
        let text = msg
            .to_text()
            .map_err(|e| SignalingError::SendFailed(e.to_string()))?;

        tracing::debug!(kind = msg.kind(), "Sending signaling message: {}", text);

        self.outbound
            .send(Outgoing::Text(text))
            .await
            .map_err(|_| SignalingError::NotConnected)
    }

    /// Nächste eingehende Nachricht, `None` sobald die Verbindung zu ist
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Schließt die Verbindung (idempotent)
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outgoing::Close);
    }
}

impl Drop for SignalingLink {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for SignalingLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalingLink")
            .field("closed", &self.outbound.is_closed())
            .finish()
    }
}

// ============================================================================
// CONNECTOR
// ============================================================================

/// Baut neue Control-Connections auf
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<SignalingLink, SignalingError>;
}

/// WebSocket Client für Signaling-Server Kommunikation
#[derive(Debug, Clone)]
pub struct SignalingClient {
    server_url: Url,
}

impl SignalingClient {
    pub fn new(server_url: Url) -> Self {
        Self { server_url }
    }
}

#[async_trait]
impl Connector for SignalingClient {
    async fn connect(&self) -> Result<SignalingLink, SignalingError> {
        tracing::info!("Connecting to signaling server: {}", self.server_url);

        let (ws_stream, _) = connect_async(self.server_url.as_str())
            .await
            .map_err(|e| SignalingError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        let (outbound, mut rx) = mpsc::channel::<Outgoing>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);

        // Read-Task starten
        let reader = tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => match decode(&text) {
                        Ok(inbound) => {
                            if inbound_tx.send(inbound).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("Dropping malformed signaling message ({}): {}", e, text);
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::info!("WebSocket closed by server: {:?}", frame);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            tracing::debug!("Signaling read task finished");
        });

        // Write-Task starten
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                match frame {
                    Outgoing::Text(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }
                    Outgoing::Close => {
                        tracing::info!("Closing signaling connection");
                        break;
                    }
                }
            }
            let _ = write.close().await;
        });

        tracing::info!("Connected to signaling server");

        Ok(SignalingLink {
            outbound,
            inbound,
            reader: Some(reader),
        })
    }
}
