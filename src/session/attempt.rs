//! Ein einzelner Verbindungsversuch
//!
//! Die `Session` besitzt Control-Connection, Peer Connection und lokalen
//! Stream eines Versuchs und wird danach komplett verworfen.
//! Ablauf:
//! 1. Tracks anhängen
//! 2. Offer erzeugen, als Local Description setzen, als `sdp_offer` senden
//! 3. Schleife über eingehende Nachrichten, Peer-Events und Disconnect

use super::status::{DisconnectHandle, StatusSink};
use crate::media::{LocalStream, MediaError};
use crate::peer::{PeerError, PeerEvent, PeerHandle, PeerTransport};
use crate::signaling::{Inbound, SignalMessage, SignalingError, SignalingLink};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("Signaling error: {0}")]
    Signaling(#[from] SignalingError),
}

/// Wie ein Versuch ohne Fehler zu Ende ging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Control-Connection wurde geschlossen (Server oder Netzwerk)
    RemoteClosed,

    /// Disconnect-Control wurde ausgelöst
    Disconnected,
}

enum Step {
    Inbound(Option<Inbound>),
    Peer(PeerEvent),
    Disconnect,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session {
    attempt: u64,
    link: SignalingLink,
    peer: Arc<dyn PeerTransport>,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    stream: Arc<LocalStream>,
    status: Arc<dyn StatusSink>,
    disconnect: Arc<Notify>,
    answer_applied: bool,
    /// Remote Candidates die vor dem Answer eintreffen
    pending_candidates: Vec<RTCIceCandidateInit>,
    connected_announced: bool,
}

impl Session {
    pub fn new(
        attempt: u64,
        link: SignalingLink,
        peer: PeerHandle,
        stream: LocalStream,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            attempt,
            link,
            peer: peer.transport,
            peer_events: peer.events,
            stream: Arc::new(stream),
            status,
            disconnect: Arc::new(Notify::new()),
            answer_applied: false,
            pending_candidates: Vec::new(),
            connected_announced: false,
        }
    }

    pub fn stream(&self) -> Arc<LocalStream> {
        Arc::clone(&self.stream)
    }

    /// Handle für den Disconnect, unabhängig vom Verbindungsstatus
    pub fn disconnect_handle(&self) -> DisconnectHandle {
        DisconnectHandle::new(Arc::clone(&self.disconnect))
    }

    /// Führt den Versuch bis zum Ende aus und räumt danach immer auf
    pub async fn run(mut self) -> Result<SessionEnd, SessionError> {
        let result = self.negotiate().await;
        self.teardown().await;
        result
    }

    async fn negotiate(&mut self) -> Result<SessionEnd, SessionError> {
        for track in self.stream.tracks() {
            self.peer.add_track(track).await?;
        }

        let offer = self.peer.create_offer().await?;
        self.peer.set_local_description(offer.clone()).await?;
        self.link.send(&SignalMessage::SdpOffer(offer)).await?;
        tracing::info!("Sent SDP offer (attempt {})", self.attempt);

        loop {
            // biased: anstehende Nachrichten werden vor dem Disconnect verarbeitet
            let step = tokio::select! {
                biased;
                inbound = self.link.recv() => Step::Inbound(inbound),
                Some(event) = self.peer_events.recv() => Step::Peer(event),
                _ = self.disconnect.notified() => Step::Disconnect,
            };

            match step {
                Step::Inbound(Some(inbound)) => self.handle_inbound(inbound).await?,
                Step::Inbound(None) => {
                    tracing::info!("Signaling connection closed");
                    return Ok(SessionEnd::RemoteClosed);
                }
                Step::Peer(event) => self.handle_peer_event(event).await,
                Step::Disconnect => {
                    tracing::info!("Disconnect requested");
                    return Ok(SessionEnd::Disconnected);
                }
            }
        }
    }

    /// Verarbeitet eingehende Signaling-Nachrichten
    ///
    /// Nur ein fehlgeschlagenes Answer beendet den Versuch, einzelne
    /// Candidates dürfen scheitern. Candidates vor dem Answer werden
    /// gepuffert und danach in Ankunftsreihenfolge angewendet.
    async fn handle_inbound(&mut self, inbound: Inbound) -> Result<(), SessionError> {
        match inbound {
            Inbound::Message(SignalMessage::SdpAnswer(answer)) => {
                if self.answer_applied {
                    tracing::warn!("Ignoring additional SDP answer");
                    return Ok(());
                }
                tracing::info!("Received SDP answer");
                tracing::debug!("{}", answer.sdp);
                self.peer.set_remote_description(answer).await?;
                self.answer_applied = true;

                let pending = std::mem::take(&mut self.pending_candidates);
                if !pending.is_empty() {
                    tracing::debug!("Applying {} queued ICE candidate(s)", pending.len());
                }
                for candidate in pending {
                    self.apply_remote_candidate(candidate).await;
                }
            }

            Inbound::Message(SignalMessage::IceCandidate(candidate)) => {
                tracing::info!("Received ICE candidate: {}", candidate.candidate);
                if self.answer_applied {
                    self.apply_remote_candidate(candidate).await;
                } else {
                    // Ohne Remote Description lehnt die Peer Connection ab
                    self.pending_candidates.push(candidate);
                }
            }

            Inbound::Message(SignalMessage::SdpOffer(_)) => {
                tracing::warn!("Ignoring SDP offer from server");
            }

            Inbound::Unknown(kind) => {
                tracing::warn!("Ignoring signaling message of unknown type '{}'", kind);
            }
        }
        Ok(())
    }

    async fn apply_remote_candidate(&self, candidate: RTCIceCandidateInit) {
        if let Err(e) = self.peer.add_ice_candidate(candidate).await {
            tracing::warn!("Failed to add ICE candidate: {}", e);
        }
    }

    /// Verarbeitet Events der Peer Connection
    async fn handle_peer_event(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                tracing::info!("Sent ICE candidate: {}", candidate.candidate);
                if let Err(e) = self.link.send(&SignalMessage::IceCandidate(candidate)).await {
                    tracing::warn!("Failed to send ICE candidate: {}", e);
                }
            }

            PeerEvent::StateChanged(RTCPeerConnectionState::Connected) => {
                if self.connected_announced {
                    return;
                }
                self.connected_announced = true;
                tracing::info!("Peer connection established");
                self.status.connected(self.disconnect_handle());
            }

            PeerEvent::StateChanged(state) => {
                tracing::debug!("Peer connection state: {}", state);
            }
        }
    }

    async fn teardown(&mut self) {
        self.link.close();
        self.stream.stop();
        if let Err(e) = self.peer.close().await {
            tracing::warn!("Failed to close peer connection: {}", e);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("attempt", &self.attempt)
            .field("answer_applied", &self.answer_applied)
            .field("pending_candidates", &self.pending_candidates.len())
            .field("connected_announced", &self.connected_announced)
            .finish()
    }
}
