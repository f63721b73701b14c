//! Peer Module - WebRTC Peer Connection
//!
//! Dieses Modul verwaltet:
//! - Aufbau der Peer Connection mit STUN-Konfiguration
//! - Offer/Answer und ICE Candidates
//! - Übersetzung der Callbacks in `PeerEvent`s

mod engine;

pub use engine::{
    default_ice_servers, ice_servers, PeerError, PeerEvent, PeerFactory, PeerHandle,
    PeerTransport, WebRtcPeer, WebRtcPeerFactory,
};
