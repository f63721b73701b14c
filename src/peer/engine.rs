//! WebRTC Peer Transport
//!
//! Kapselt `RTCPeerConnection` hinter `PeerTransport`. Callbacks der
//! Connection werden in einen Event-Channel übersetzt, damit die Session
//! alles in einer Schleife verarbeiten kann.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("WebRTC error: {0}")]
    WebRTC(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),
}

impl From<webrtc::Error> for PeerError {
    fn from(e: webrtc::Error) -> Self {
        PeerError::WebRTC(e.to_string())
    }
}

// ============================================================================
// EVENTS & TRAITS
// ============================================================================

/// Events die von der Peer Connection ausgelöst werden
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// Lokaler ICE Candidate (ohne den abschließenden `None`)
    LocalCandidate(RTCIceCandidateInit),

    /// Aggregierter Verbindungsstatus hat sich geändert
    StateChanged(RTCPeerConnectionState),
}

/// Die Operationen die eine Session auf der Peer Connection ausführt
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<(), PeerError>;

    async fn create_offer(&self) -> Result<RTCSessionDescription, PeerError>;

    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError>;

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError>;

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

/// Transport plus zugehöriger Event-Stream
pub struct PeerHandle {
    pub transport: Arc<dyn PeerTransport>,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
}

/// Erstellt pro Verbindungsversuch eine frische Peer Connection
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(&self) -> Result<PeerHandle, PeerError>;
}

// ============================================================================
// ICE SERVER CONFIGURATION
// ============================================================================

/// Ein öffentlicher STUN-Server, keine Credentials
pub fn default_ice_servers() -> Vec<RTCIceServer> {
    ice_servers(crate::config::DEFAULT_STUN_URL)
}

pub fn ice_servers(url: &str) -> Vec<RTCIceServer> {
    vec![RTCIceServer {
        urls: vec![url.to_string()],
        ..Default::default()
    }]
}

// ============================================================================
// WEBRTC IMPLEMENTATION
// ============================================================================

/// `PeerFactory` auf Basis von webrtc-rs
#[derive(Debug, Clone)]
pub struct WebRtcPeerFactory {
    ice_servers: Vec<RTCIceServer>,
}

impl WebRtcPeerFactory {
    pub fn new(ice_servers: Vec<RTCIceServer>) -> Self {
        Self { ice_servers }
    }
}

impl Default for WebRtcPeerFactory {
    fn default() -> Self {
        Self::new(default_ice_servers())
    }
}

#[async_trait]
impl PeerFactory for WebRtcPeerFactory {
    async fn create(&self) -> Result<PeerHandle, PeerError> {
        // Media Engine mit Standard-Codecs (VP8/VP9/H264/Opus)
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let config = RTCConfiguration {
            ice_servers: self.ice_servers.clone(),
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(config).await?);
        let (event_tx, events) = mpsc::unbounded_channel();
        register_handlers(&pc, event_tx);

        Ok(PeerHandle {
            transport: Arc::new(WebRtcPeer { pc }),
            events,
        })
    }
}

/// Registriert Event Handler für die Peer Connection
fn register_handlers(pc: &RTCPeerConnection, event_tx: mpsc::UnboundedSender<PeerEvent>) {
    // Connection State Handler
    let state_tx = event_tx.clone();
    pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
        tracing::info!("Peer connection state: {}", s);
        let _ = state_tx.send(PeerEvent::StateChanged(s));
        Box::pin(async {})
    }));

    // ICE Candidate Handler, `None` markiert das Ende des Gatherings
    pc.on_ice_candidate(Box::new(move |candidate| {
        if let Some(event) = candidate_event(candidate) {
            let _ = event_tx.send(event);
        }
        Box::pin(async {})
    }));
}

/// Übersetzt einen gesammelten Candidate, das abschließende `None` wird nie gesendet
fn candidate_event(candidate: Option<RTCIceCandidate>) -> Option<PeerEvent> {
    let Some(candidate) = candidate else {
        tracing::debug!("ICE gathering complete");
        return None;
    };

    match candidate.to_json() {
        Ok(init) => Some(PeerEvent::LocalCandidate(init)),
        Err(e) => {
            tracing::warn!("Failed to serialize ICE candidate: {}", e);
            None
        }
    }
}

/// Eine einzelne webrtc-rs Peer Connection
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerTransport for WebRtcPeer {
    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<(), PeerError> {
        let sender = self.pc.add_track(track).await?;

        // RTCP lesen, sonst laufen die Interceptors (NACK, Reports) nicht
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        Ok(())
    }

    async fn create_offer(&self) -> Result<RTCSessionDescription, PeerError> {
        Ok(self.pc.create_offer(None).await?)
    }

    async fn set_local_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError> {
        Ok(self.pc.set_local_description(desc).await?)
    }

    async fn set_remote_description(&self, desc: RTCSessionDescription) -> Result<(), PeerError> {
        self.pc
            .set_remote_description(desc)
            .await
            .map_err(|e| PeerError::InvalidSdp(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<(), PeerError> {
        Ok(self.pc.add_ice_candidate(candidate).await?)
    }

    async fn close(&self) -> Result<(), PeerError> {
        Ok(self.pc.close().await?)
    }
}

impl std::fmt::Debug for WebRtcPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcPeer")
            .field("state", &self.pc.connection_state())
            .finish()
    }
}
