//! Message Types für das Signaling-Protokoll
//!
//! Jede Nachricht ist ein Envelope `{ "type": <string>, "data": <payload> }`.
//! Die Payloads sind die JSON-Formen aus dem Browser (`RTCSessionDescription`,
//! `RTCIceCandidateInit`) und werden unverändert durchgereicht.

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

pub const SDP_OFFER: &str = "sdp_offer";
pub const SDP_ANSWER: &str = "sdp_answer";
pub const ICE_CANDIDATE: &str = "ice_candidate";

// ============================================================================
// ENVELOPE
// ============================================================================

/// Alle bekannten Signaling-Nachrichten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Client → Server
    SdpOffer(RTCSessionDescription),

    /// Server → Client
    SdpAnswer(RTCSessionDescription),

    /// Beide Richtungen
    IceCandidate(RTCIceCandidateInit),
}

impl SignalMessage {
    /// Wert des `type` Feldes
    pub fn kind(&self) -> &'static str {
        match self {
            SignalMessage::SdpOffer(_) => SDP_OFFER,
            SignalMessage::SdpAnswer(_) => SDP_ANSWER,
            SignalMessage::IceCandidate(_) => ICE_CANDIDATE,
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Ergebnis des Parsens einer eingehenden Nachricht
#[derive(Debug, Clone)]
pub enum Inbound {
    Message(SignalMessage),

    /// Gültiges Envelope mit unbekanntem `type`
    Unknown(String),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Parst ein Text-Frame
///
/// Unbekannte `type` Werte sind kein Fehler, nur ein kaputtes Envelope oder
/// eine kaputte Payload eines bekannten Typs.
pub fn decode(text: &str) -> Result<Inbound, serde_json::Error> {
    let raw: RawEnvelope = serde_json::from_str(text)?;

    let msg = match raw.msg_type.as_str() {
        SDP_OFFER => SignalMessage::SdpOffer(serde_json::from_value(raw.data)?),
        SDP_ANSWER => SignalMessage::SdpAnswer(serde_json::from_value(raw.data)?),
        ICE_CANDIDATE => SignalMessage::IceCandidate(serde_json::from_value(raw.data)?),
        _ => return Ok(Inbound::Unknown(raw.msg_type)),
    };

    Ok(Inbound::Message(msg))
}
